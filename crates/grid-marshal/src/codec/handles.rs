// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-session handle tables.

use crate::model::{identity, ObjectRef, Value};
use std::collections::HashMap;

/// Encode side: object identity -> output offset of its first encoding.
///
/// Holds a reference to every tracked object so an identity cannot be reused
/// by a new allocation while the session is running.
#[derive(Default)]
pub struct HandleTable {
    offsets: HashMap<usize, (usize, ObjectRef)>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Previously assigned offset of `obj`, or `None` after recording `offset`
    /// as its first encoding.
    pub fn lookup_or_insert(&mut self, obj: &ObjectRef, offset: usize) -> Option<usize> {
        match self.offsets.entry(identity(obj)) {
            std::collections::hash_map::Entry::Occupied(hit) => Some(hit.get().0),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert((offset, ObjectRef::clone(obj)));
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
    }
}

/// Decode side: absolute input offset -> decoded object.
#[derive(Default)]
pub struct HandleReplay {
    objects: HashMap<usize, Value>,
}

impl HandleReplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, offset: usize, value: Value) {
        self.objects.insert(offset, value);
    }

    pub fn get(&self, offset: usize) -> Option<&Value> {
        self.objects.get(&offset)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}
