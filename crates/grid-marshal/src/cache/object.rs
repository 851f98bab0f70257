// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cache value wrapper.
//!
//! Holds a live value, its encoded bytes, or both. The bytes may be a window
//! into a larger buffer (a received message, a field read); such an object is
//! *attached* until [`CacheOptimizedObject::detach`] copies the window out.
//!
//! The value and bytes slots are `ArcSwapOption`s: lazy materialization is a
//! last-write-wins store, and every racing writer stores a correct decoding
//! of the same bytes.

use super::context::{CacheObjectContext, QueryItem};
use crate::descriptor::ClassLoader;
use crate::error::{CodecError, MarshalError, MarshalResult};
use crate::marshaller::{ByteWindow, FieldRead};
use crate::model::Value;
use arc_swap::ArcSwapOption;
use std::fmt;
use std::sync::Arc;

/// Cache object type code of optimized-marshaller objects.
pub const TYPE_OPTIMIZED: u8 = 3;

pub struct CacheOptimizedObject {
    val: ArcSwapOption<Value>,
    bytes: ArcSwapOption<ByteWindow>,
}

impl CacheOptimizedObject {
    pub fn from_value(value: Value) -> Self {
        Self {
            val: ArcSwapOption::from_pointee(value),
            bytes: ArcSwapOption::empty(),
        }
    }

    /// Wrap an owned encoding. `None` if `bytes` is empty.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        Self::from_window(ByteWindow::owned(bytes))
    }

    /// Wrap a window into a shared buffer. `None` if the window is empty.
    pub fn from_window(window: ByteWindow) -> Option<Self> {
        (!window.is_empty()).then(|| Self {
            val: ArcSwapOption::empty(),
            bytes: ArcSwapOption::from_pointee(window),
        })
    }

    /// Value together with its known encoding.
    pub fn with_value_and_bytes(value: Value, window: ByteWindow) -> Self {
        Self {
            val: ArcSwapOption::from_pointee(value),
            bytes: ArcSwapOption::from_pointee(window),
        }
    }

    /// Materialized value.
    ///
    /// With `copy` (and the context's copy-on-get) a mutable value is decoded
    /// afresh from bytes, so the caller never aliases a shared instance.
    /// Otherwise the held value is returned, or decoded once and kept when
    /// the context stores values.
    pub fn value(&self, ctx: &CacheObjectContext, copy: bool) -> MarshalResult<Value> {
        let current = self.val.load_full();
        let copy = copy
            && ctx.copy_on_get()
            && current
                .as_deref()
                .is_some_and(|v| !ctx.processor().immutable(v));

        if copy {
            let window = self.marshaled_form(ctx)?;
            return self.unmarshal(ctx, &window);
        }
        if let Some(value) = current {
            return Ok((*value).clone());
        }

        let window = self.window()?;
        let value = self.unmarshal(ctx, &window)?;
        if ctx.store_value() {
            self.val.store(Some(Arc::new(value.clone())));
        }
        Ok(value)
    }

    /// Encoded bytes. Shares the buffer when detached, copies the window
    /// otherwise.
    pub fn value_bytes(&self, ctx: &CacheObjectContext) -> MarshalResult<Arc<[u8]>> {
        let window = self.marshaled_form(ctx)?;
        if window.is_detached() {
            Ok(Arc::clone(window.buffer()))
        } else {
            Ok(Arc::from(window.as_slice()))
        }
    }

    /// Called before the object is stored in a cache: detaches it from any
    /// transient buffer.
    pub fn prepare_for_cache(self: &Arc<Self>, _ctx: &CacheObjectContext) -> Arc<Self> {
        self.detach()
    }

    /// This object when detached, else a bytes-only copy over its own buffer.
    pub fn detach(self: &Arc<Self>) -> Arc<Self> {
        match self.bytes.load_full() {
            Some(window) if !window.is_detached() => Arc::new(Self {
                val: ArcSwapOption::empty(),
                bytes: ArcSwapOption::from_pointee(window.detach()),
            }),
            _ => Arc::clone(self),
        }
    }

    /// True unless the bytes are a window into a larger buffer. An object
    /// holding only a value references no buffer.
    pub fn is_detached(&self) -> bool {
        self.bytes
            .load()
            .as_deref()
            .map_or(true, ByteWindow::is_detached)
    }

    /// Decode now when the context stores values.
    pub fn finish_unmarshal(
        &self,
        ctx: &CacheObjectContext,
        loader: &dyn ClassLoader,
    ) -> MarshalResult<()> {
        if self.val.load().is_none() && ctx.store_value() {
            let window = self.window()?;
            let value = ctx.processor().unmarshal(
                ctx,
                window.buffer(),
                window.start(),
                window.len(),
                loader,
            )?;
            self.val.store(Some(Arc::new(value)));
        }
        Ok(())
    }

    /// Make sure the encoded form exists before the object is sent.
    pub fn prepare_marshal(&self, ctx: &CacheObjectContext) -> MarshalResult<()> {
        self.marshaled_form(ctx).map(|_| ())
    }

    pub fn has_field(&self, ctx: &CacheObjectContext, name: &str) -> MarshalResult<bool> {
        let window = self.marshaled_form(ctx)?;
        ctx.processor()
            .has_field(name, window.buffer(), window.start(), window.len())
    }

    /// One field without decoding the whole object. Handles to indexed
    /// objects come back as wrappers over their bytes.
    pub fn field(&self, ctx: &CacheObjectContext, name: &str) -> MarshalResult<Option<QueryItem>> {
        let window = self.marshaled_form(ctx)?;
        let loader = ctx.kernal_config().class_loader();
        let read = ctx.processor().read_field(
            name,
            window.buffer(),
            window.start(),
            window.len(),
            loader.as_ref(),
        )?;
        Ok(read.map(|read| match read {
            FieldRead::Value(v) => QueryItem::Value(v),
            FieldRead::Serialized(w) => match Self::from_window(w) {
                Some(obj) => QueryItem::Cached(Arc::new(obj)),
                None => QueryItem::Value(Value::Null),
            },
        }))
    }

    pub fn cache_object_type(&self) -> u8 {
        TYPE_OPTIMIZED
    }

    /// Current bytes window, if encoded.
    pub fn bytes_window(&self) -> Option<Arc<ByteWindow>> {
        self.bytes.load_full()
    }

    pub fn has_value(&self) -> bool {
        self.val.load().is_some()
    }

    fn window(&self) -> MarshalResult<Arc<ByteWindow>> {
        self.bytes.load_full().ok_or_else(|| MarshalError::Deserialization {
            loader: String::new(),
            source: CodecError::invalid("cache object holds neither a value nor bytes"),
        })
    }

    fn marshaled_form(&self, ctx: &CacheObjectContext) -> MarshalResult<Arc<ByteWindow>> {
        if let Some(window) = self.bytes.load_full() {
            return Ok(window);
        }
        let value = self.val.load_full().ok_or_else(|| MarshalError::Serialization {
            object: "<empty cache object>".into(),
            source: CodecError::invalid("cache object holds neither a value nor bytes"),
        })?;
        let window = Arc::new(ByteWindow::owned(ctx.processor().marshal(ctx, &value)?));
        self.bytes.store(Some(Arc::clone(&window)));
        log::trace!("[cache-object] marshaled {} into {} bytes", value.describe(), window.len());
        Ok(window)
    }

    fn unmarshal(&self, ctx: &CacheObjectContext, window: &ByteWindow) -> MarshalResult<Value> {
        let loader = ctx.kernal_config().class_loader();
        ctx.processor().unmarshal(
            ctx,
            window.buffer(),
            window.start(),
            window.len(),
            loader.as_ref(),
        )
    }
}

impl fmt::Debug for CacheOptimizedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptimizedObject")
            .field("val", &self.val.load().as_deref())
            .field("bytes", &self.bytes.load().as_deref())
            .finish()
    }
}
