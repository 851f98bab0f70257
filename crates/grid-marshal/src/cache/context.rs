// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cache object context and the processor it routes codec calls through.

use super::interceptor::{CacheInterceptor, InterceptorGuard};
use super::key::KeyCacheOptimizedObject;
use super::object::CacheOptimizedObject;
use crate::descriptor::ClassLoader;
use crate::error::MarshalResult;
use crate::marshaller::{FieldRead, GridMarshaller};
use crate::model::Value;
use std::fmt;
use std::sync::Arc;

/// Node-level settings the cache layer reads from.
#[derive(Clone)]
pub struct KernalConfig {
    class_loader: Arc<dyn ClassLoader>,
    peer_class_loading: bool,
}

impl KernalConfig {
    pub fn new(class_loader: Arc<dyn ClassLoader>) -> Self {
        Self {
            class_loader,
            peer_class_loading: false,
        }
    }

    pub fn with_peer_class_loading(mut self, enabled: bool) -> Self {
        self.peer_class_loading = enabled;
        self
    }

    /// Default loader when none is supplied explicitly.
    pub fn class_loader(&self) -> &Arc<dyn ClassLoader> {
        &self.class_loader
    }

    pub fn peer_class_loading(&self) -> bool {
        self.peer_class_loading
    }
}

impl fmt::Debug for KernalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernalConfig")
            .field("class_loader", &self.class_loader.name())
            .field("peer_class_loading", &self.peer_class_loading)
            .finish()
    }
}

/// Codec operations the cache wrappers depend on.
pub trait CacheObjectProcessor: Send + Sync {
    fn marshal(&self, ctx: &CacheObjectContext, value: &Value) -> MarshalResult<Vec<u8>>;

    fn unmarshal(
        &self,
        ctx: &CacheObjectContext,
        bytes: &[u8],
        off: usize,
        len: usize,
        loader: &dyn ClassLoader,
    ) -> MarshalResult<Value>;

    fn has_field(&self, name: &str, bytes: &[u8], off: usize, len: usize) -> MarshalResult<bool>;

    fn read_field(
        &self,
        name: &str,
        bytes: &Arc<[u8]>,
        off: usize,
        len: usize,
        loader: &dyn ClassLoader,
    ) -> MarshalResult<Option<FieldRead>>;

    fn fields_indexing_enabled(&self) -> bool;

    /// Values that can be handed out without copying.
    fn immutable(&self, value: &Value) -> bool {
        !matches!(value, Value::Object(_))
    }
}

/// [`CacheObjectProcessor`] backed by a [`GridMarshaller`].
pub struct OptimizedObjectProcessor {
    marshaller: Arc<GridMarshaller>,
}

impl OptimizedObjectProcessor {
    pub fn new(marshaller: Arc<GridMarshaller>) -> Self {
        Self { marshaller }
    }

    pub fn marshaller(&self) -> &Arc<GridMarshaller> {
        &self.marshaller
    }
}

impl CacheObjectProcessor for OptimizedObjectProcessor {
    fn marshal(&self, _ctx: &CacheObjectContext, value: &Value) -> MarshalResult<Vec<u8>> {
        self.marshaller.marshal(value)
    }

    fn unmarshal(
        &self,
        _ctx: &CacheObjectContext,
        bytes: &[u8],
        off: usize,
        len: usize,
        loader: &dyn ClassLoader,
    ) -> MarshalResult<Value> {
        self.marshaller.unmarshal_window(bytes, off, len, loader)
    }

    fn has_field(&self, name: &str, bytes: &[u8], off: usize, len: usize) -> MarshalResult<bool> {
        self.marshaller.has_field(name, bytes, off, len)
    }

    fn read_field(
        &self,
        name: &str,
        bytes: &Arc<[u8]>,
        off: usize,
        len: usize,
        loader: &dyn ClassLoader,
    ) -> MarshalResult<Option<FieldRead>> {
        self.marshaller.read_field(name, bytes, off, len, loader)
    }

    fn fields_indexing_enabled(&self) -> bool {
        self.marshaller.config().fields_indexing
    }
}

/// Item handed to query consumers, possibly still wrapped.
#[derive(Debug, Clone)]
pub enum QueryItem {
    Value(Value),
    Cached(Arc<CacheOptimizedObject>),
    Key(Arc<KeyCacheOptimizedObject>),
    Entry(Box<QueryItem>, Box<QueryItem>),
    /// Array-backed list, unwrapped in place.
    List(Vec<QueryItem>),
    Set(Vec<QueryItem>),
    /// Any other collection; unwraps into a `List`.
    Collection(Vec<QueryItem>),
    Map(Vec<(QueryItem, QueryItem)>),
}

impl QueryItem {
    /// Wrapped objects, entries and collections.
    pub fn is_wrapped_or_collection(&self) -> bool {
        !matches!(self, Self::Value(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Per-cache codec settings. Immutable once built and freely shared.
pub struct CacheObjectContext {
    kernal: KernalConfig,
    processor: Arc<dyn CacheObjectProcessor>,
    copy_on_get: bool,
    store_value: bool,
    system_cache: bool,
    p2p_enabled: bool,
    interceptor: Option<InterceptorGuard>,
}

impl CacheObjectContext {
    pub fn builder(
        kernal: KernalConfig,
        processor: Arc<dyn CacheObjectProcessor>,
    ) -> CacheObjectContextBuilder {
        CacheObjectContextBuilder {
            kernal,
            processor,
            copy_on_get: true,
            store_value: true,
            system_cache: false,
            interceptor: None,
        }
    }

    pub fn copy_on_get(&self) -> bool {
        self.copy_on_get
    }

    pub fn store_value(&self) -> bool {
        self.store_value
    }

    pub fn system_cache(&self) -> bool {
        self.system_cache
    }

    pub fn peer_class_loading_enabled(&self) -> bool {
        self.p2p_enabled
    }

    pub fn kernal_config(&self) -> &KernalConfig {
        &self.kernal
    }

    pub fn processor(&self) -> &Arc<dyn CacheObjectProcessor> {
        &self.processor
    }

    pub fn interceptor(&self) -> Option<&InterceptorGuard> {
        self.interceptor.as_ref()
    }

    /// Unwrap a query item when the processor has fields indexing enabled;
    /// otherwise return it untouched.
    pub fn unwrap_if_needed(&self, item: QueryItem) -> MarshalResult<QueryItem> {
        if self.processor.fields_indexing_enabled() && item.is_wrapped_or_collection() {
            return self.unwrap_object(item);
        }
        Ok(item)
    }

    /// Unwrap every element of a collection.
    pub fn unwrap_all_if_needed(&self, items: Vec<QueryItem>) -> MarshalResult<Vec<QueryItem>> {
        if !self.processor.fields_indexing_enabled() {
            return Ok(items);
        }
        items.into_iter().map(|item| self.unwrap_object(item)).collect()
    }

    fn unwrap_object(&self, item: QueryItem) -> MarshalResult<QueryItem> {
        Ok(match item {
            QueryItem::Value(v) => QueryItem::Value(v),
            QueryItem::Cached(obj) => QueryItem::Value(obj.value(self, false)?),
            QueryItem::Key(key) => QueryItem::Value(key.deserialize()),
            QueryItem::Entry(k, v) => QueryItem::Entry(
                Box::new(self.unwrap_object(*k)?),
                Box::new(self.unwrap_object(*v)?),
            ),
            QueryItem::List(items) => QueryItem::List(self.unwrap_all(items)?),
            QueryItem::Set(items) => QueryItem::Set(self.unwrap_all(items)?),
            QueryItem::Collection(items) => QueryItem::List(self.unwrap_all(items)?),
            QueryItem::Map(entries) => QueryItem::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| Ok((self.unwrap_object(k)?, self.unwrap_object(v)?)))
                    .collect::<MarshalResult<_>>()?,
            ),
        })
    }

    fn unwrap_all(&self, items: Vec<QueryItem>) -> MarshalResult<Vec<QueryItem>> {
        items.into_iter().map(|item| self.unwrap_object(item)).collect()
    }
}

impl fmt::Debug for CacheObjectContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheObjectContext")
            .field("copy_on_get", &self.copy_on_get)
            .field("store_value", &self.store_value)
            .field("system_cache", &self.system_cache)
            .field("p2p_enabled", &self.p2p_enabled)
            .finish()
    }
}

/// Builder for [`CacheObjectContext`].
pub struct CacheObjectContextBuilder {
    kernal: KernalConfig,
    processor: Arc<dyn CacheObjectProcessor>,
    copy_on_get: bool,
    store_value: bool,
    system_cache: bool,
    interceptor: Option<InterceptorGuard>,
}

impl CacheObjectContextBuilder {
    pub fn copy_on_get(mut self, enabled: bool) -> Self {
        self.copy_on_get = enabled;
        self
    }

    pub fn store_value(mut self, enabled: bool) -> Self {
        self.store_value = enabled;
        self
    }

    pub fn system_cache(mut self, enabled: bool) -> Self {
        self.system_cache = enabled;
        self
    }

    pub fn interceptor(mut self, interceptor: Arc<dyn CacheInterceptor>) -> Self {
        self.interceptor = Some(InterceptorGuard::new(interceptor));
        self
    }

    pub fn build(self) -> CacheObjectContext {
        CacheObjectContext {
            p2p_enabled: self.kernal.peer_class_loading(),
            kernal: self.kernal,
            processor: self.processor,
            copy_on_get: self.copy_on_get,
            store_value: self.store_value,
            system_cache: self.system_cache,
            interceptor: self.interceptor,
        }
    }
}
