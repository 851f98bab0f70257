// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cache-object layer
//!
//! Wrappers that let a cache hold values in live form, encoded form, or
//! both, and materialize them lazily according to a [`CacheObjectContext`].
//!
//! - [`CacheOptimizedObject`]: value wrapper (copy-on-get, store-value,
//!   detach from transient buffers, footer field reads)
//! - [`KeyCacheOptimizedObject`]: key wrapper, always live, hashed by value
//! - [`CacheObjectProcessor`]: codec seam, implemented over
//!   [`crate::GridMarshaller`] by [`OptimizedObjectProcessor`]
//! - [`CacheInterceptor`]: user hooks, only ever called through
//!   [`InterceptorGuard`]

mod context;
mod interceptor;
mod key;
mod object;

pub use context::{
    CacheObjectContext, CacheObjectContextBuilder, CacheObjectProcessor, KernalConfig,
    OptimizedObjectProcessor, QueryItem,
};
pub use interceptor::{
    CacheEntry, CacheInterceptor, HookError, HookResult, InterceptorGuard,
};
pub use key::KeyCacheOptimizedObject;
pub use object::{CacheOptimizedObject, TYPE_OPTIMIZED};
