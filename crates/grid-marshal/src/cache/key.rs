// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cache key wrapper.
//!
//! A key always holds its live value: partitioning and map lookups hash and
//! compare the key directly, so `value()` returns the wrapper itself and
//! never touches the codec. Equality and hashing are structural over the
//! held value.

use super::context::CacheObjectContext;
use super::object::TYPE_OPTIMIZED;
use crate::error::MarshalResult;
use crate::marshaller::ByteWindow;
use crate::model::{deep_eq, deep_hash, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Hash recursion limit for nested key values.
const KEY_HASH_DEPTH: usize = 8;

pub struct KeyCacheOptimizedObject {
    val: Value,
    bytes: Option<ByteWindow>,
}

impl KeyCacheOptimizedObject {
    /// Wrap a key value. `None` for `Value::Null`: keys are never null.
    pub fn new(val: Value) -> Option<Self> {
        Self::build(val, None)
    }

    /// Key together with its known encoding.
    pub fn with_bytes(val: Value, bytes: ByteWindow) -> Option<Self> {
        Self::build(val, Some(bytes))
    }

    fn build(val: Value, bytes: Option<ByteWindow>) -> Option<Self> {
        if val.is_null() {
            log::debug!("[cache-key] rejected null key");
            return None;
        }
        Some(Self { val, bytes })
    }

    /// Keys are their own materialized form.
    pub fn value(self: &Arc<Self>, _ctx: &CacheObjectContext, _copy: bool) -> Arc<Self> {
        Arc::clone(self)
    }

    /// Key payload.
    pub fn deserialize(&self) -> Value {
        self.val.clone()
    }

    /// Keys are never attached to a transient buffer they depend on.
    pub fn prepare_for_cache(self: &Arc<Self>, _ctx: &CacheObjectContext) -> Arc<Self> {
        Arc::clone(self)
    }

    /// True when the key's class is an internal marker type.
    pub fn internal(&self) -> bool {
        self.val.class().is_some_and(|c| c.is_internal())
    }

    /// Encoded key, marshaling on first use.
    pub fn value_bytes(&self, ctx: &CacheObjectContext) -> MarshalResult<Arc<[u8]>> {
        match &self.bytes {
            Some(window) if window.is_detached() => Ok(Arc::clone(window.buffer())),
            Some(window) => Ok(Arc::from(window.as_slice())),
            None => ctx
                .processor()
                .marshal(ctx, &self.val)
                .map(Arc::from),
        }
    }

    pub fn cache_object_type(&self) -> u8 {
        TYPE_OPTIMIZED
    }
}

impl PartialEq for KeyCacheOptimizedObject {
    fn eq(&self, other: &Self) -> bool {
        deep_eq(&self.val, &other.val)
    }
}

impl Eq for KeyCacheOptimizedObject {}

impl Hash for KeyCacheOptimizedObject {
    fn hash<H: Hasher>(&self, state: &mut H) {
        deep_hash(&self.val, KEY_HASH_DEPTH, state);
    }
}

impl fmt::Debug for KeyCacheOptimizedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyCacheOptimizedObject")
            .field("val", &self.val)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::context::{KernalConfig, OptimizedObjectProcessor};
    use crate::descriptor::ClassCatalog;
    use crate::marshaller::GridMarshaller;
    use crate::model::{ClassDef, FieldType, HeapObject, Instance};
    use std::collections::HashSet;

    fn ctx() -> CacheObjectContext {
        CacheObjectContext::builder(
            KernalConfig::new(Arc::new(ClassCatalog::new("app"))),
            Arc::new(OptimizedObjectProcessor::new(Arc::new(GridMarshaller::new()))),
        )
        .build()
    }

    fn user_key(id: i64) -> Value {
        let class = ClassDef::builder("UserKey")
            .field("id", FieldType::Long)
            .build();
        Value::object(HeapObject::Instance(
            Instance::new(&class).with("id", id).expect("id"),
        ))
    }

    #[test]
    fn test_value_returns_self() {
        let ctx = ctx();
        let key = Arc::new(KeyCacheOptimizedObject::new(user_key(1)).expect("key"));
        assert!(Arc::ptr_eq(&key.value(&ctx, true), &key));
        assert!(Arc::ptr_eq(&key.value(&ctx, false), &key));
        assert!(Arc::ptr_eq(&key.prepare_for_cache(&ctx), &key));
    }

    #[test]
    fn test_equality_and_hash_follow_value() {
        let a = KeyCacheOptimizedObject::new(user_key(7)).expect("key");
        let b = KeyCacheOptimizedObject::new(user_key(7)).expect("key");
        let c = KeyCacheOptimizedObject::new(user_key(8)).expect("key");
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert!(!set.contains(&c));
    }

    #[test]
    fn test_internal_marker_keys() {
        let marker = ClassDef::builder("TxLock").internal().build();
        let key = KeyCacheOptimizedObject::new(Value::object(HeapObject::Instance(
            Instance::new(&marker),
        )))
        .expect("key");
        assert!(key.internal());
        let plain = KeyCacheOptimizedObject::new(Value::from("plain")).expect("key");
        assert!(!plain.internal());
    }

    #[test]
    fn test_value_bytes_marshal_on_demand() {
        let ctx = ctx();
        let key = KeyCacheOptimizedObject::new(Value::Long(99)).expect("key");
        let bytes = key.value_bytes(&ctx).expect("bytes");
        let decoded = ctx
            .processor()
            .unmarshal(&ctx, &bytes, 0, bytes.len(), &ClassCatalog::new("app"))
            .expect("decode");
        assert_eq!(decoded, Value::Long(99));
        assert_eq!(key.deserialize(), Value::Long(99));
    }

    #[test]
    fn test_null_key_is_rejected() {
        assert!(KeyCacheOptimizedObject::new(Value::Null).is_none());
        let window = ByteWindow::owned(vec![0u8]);
        assert!(KeyCacheOptimizedObject::with_bytes(Value::Null, window).is_none());
        assert!(KeyCacheOptimizedObject::new(Value::Int(0)).is_some());
    }
}
