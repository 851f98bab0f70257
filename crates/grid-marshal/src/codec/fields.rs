// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field-by-field access for custom write/read routines.

use crate::error::CodecResult;
use crate::model::{ClassDef, Instance, Value};
use std::sync::Arc;

/// Field values staged by a custom write routine, written by
/// [`super::ObjectWriter::write_fields`] in the default field layout.
#[derive(Debug, Clone)]
pub struct PutFields {
    staged: Instance,
}

impl PutFields {
    pub(crate) fn new(class: &Arc<ClassDef>) -> Self {
        Self {
            staged: Instance::new(class),
        }
    }

    /// Stage a value; fields never put are written with their zero value.
    pub fn put(&mut self, name: &str, value: impl Into<Value>) -> CodecResult<&mut Self> {
        self.staged.set(name, value.into())?;
        Ok(self)
    }

    pub(crate) fn staged(&self) -> &Instance {
        &self.staged
    }
}

/// Field values read by [`super::ObjectReader::read_fields`].
#[derive(Debug, Clone)]
pub struct GetFields {
    read: Instance,
}

impl GetFields {
    pub(crate) fn new(read: Instance) -> Self {
        Self { read }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.read.get(name)
    }

    /// Value of `name`, or `default` if the class has no such field.
    pub fn get_or(&self, name: &str, default: Value) -> Value {
        self.get(name).cloned().unwrap_or(default)
    }

    pub fn into_instance(self) -> Instance {
        self.read
    }
}
