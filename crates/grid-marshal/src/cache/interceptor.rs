// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cache interceptor hooks.
//!
//! Hooks run inside the cache's critical sections, so they must not lock,
//! perform network calls or call back into the cache. Every call goes
//! through [`InterceptorGuard`], which turns a failing or panicking hook into
//! a warning and the un-intercepted result.

use crate::model::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub type HookError = Box<dyn std::error::Error + Send + Sync>;
pub type HookResult<T> = Result<T, HookError>;

/// Entry seen by put/remove hooks.
#[derive(Debug, Clone, Copy)]
pub struct CacheEntry<'a> {
    pub key: &'a Value,
    pub value: Option<&'a Value>,
}

/// User callbacks around cache get/put/remove. Every hook defaults to a
/// no-op that keeps the value unchanged.
pub trait CacheInterceptor: Send + Sync {
    /// Value returned to the reader, possibly replaced.
    fn on_get(&self, _key: &Value, value: Option<Value>) -> HookResult<Option<Value>> {
        Ok(value)
    }

    /// Value to store; `None` cancels the put.
    fn on_before_put(&self, _entry: CacheEntry<'_>, new_value: Value) -> HookResult<Option<Value>> {
        Ok(Some(new_value))
    }

    fn on_after_put(&self, _entry: CacheEntry<'_>) -> HookResult<()> {
        Ok(())
    }

    /// `(cancel, value returned to the remover)`.
    fn on_before_remove(&self, entry: CacheEntry<'_>) -> HookResult<(bool, Option<Value>)> {
        Ok((false, entry.value.cloned()))
    }

    fn on_after_remove(&self, _entry: CacheEntry<'_>) -> HookResult<()> {
        Ok(())
    }
}

/// No-propagate boundary around a [`CacheInterceptor`].
#[derive(Clone)]
pub struct InterceptorGuard {
    inner: Arc<dyn CacheInterceptor>,
}

impl InterceptorGuard {
    pub fn new(inner: Arc<dyn CacheInterceptor>) -> Self {
        Self { inner }
    }

    pub fn on_get(&self, key: &Value, value: Option<Value>) -> Option<Value> {
        let fallback = value.clone();
        self.call("on_get", fallback, |hook| hook.on_get(key, value))
    }

    pub fn on_before_put(&self, entry: CacheEntry<'_>, new_value: Value) -> Option<Value> {
        let fallback = Some(new_value.clone());
        self.call("on_before_put", fallback, |hook| {
            hook.on_before_put(entry, new_value)
        })
    }

    pub fn on_after_put(&self, entry: CacheEntry<'_>) {
        self.call("on_after_put", (), |hook| hook.on_after_put(entry));
    }

    pub fn on_before_remove(&self, entry: CacheEntry<'_>) -> (bool, Option<Value>) {
        let fallback = (false, entry.value.cloned());
        self.call("on_before_remove", fallback, |hook| {
            hook.on_before_remove(entry)
        })
    }

    pub fn on_after_remove(&self, entry: CacheEntry<'_>) {
        self.call("on_after_remove", (), |hook| hook.on_after_remove(entry));
    }

    fn call<T>(
        &self,
        name: &str,
        fallback: T,
        f: impl FnOnce(&dyn CacheInterceptor) -> HookResult<T>,
    ) -> T {
        match panic::catch_unwind(AssertUnwindSafe(|| f(self.inner.as_ref()))) {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                log::warn!("[interceptor] {} failed, ignoring: {}", name, err);
                fallback
            }
            Err(payload) => {
                log::warn!(
                    "[interceptor] {} panicked, ignoring: {}",
                    name,
                    panic_message(payload.as_ref())
                );
                fallback
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}
