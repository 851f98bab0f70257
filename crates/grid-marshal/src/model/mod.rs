// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Object model
//!
//! Runtime stand-in for reflection: classes are explicit [`ClassDef`] values
//! and objects are [`HeapObject`] nodes behind shared [`ObjectRef`] handles,
//! so graph identity (cycles, shared subgraphs) is pointer identity.
//!
//! # Example
//!
//! ```rust
//! use grid_marshal::model::{ClassDef, FieldType, HeapObject, Instance, Value};
//!
//! let point = ClassDef::builder("Point")
//!     .field("x", FieldType::Int)
//!     .field("y", FieldType::Int)
//!     .build();
//!
//! let inst = Instance::new(&point)
//!     .with("x", 5)
//!     .and_then(|i| i.with("y", 9))
//!     .unwrap();
//! let value = Value::object(HeapObject::Instance(inst));
//! assert_eq!(value.class().unwrap().name(), "Point");
//! ```

mod class;
mod object;
mod value;

pub use class::{
    ClassDef, ClassDefBuilder, CustomSerialization, Externalizable, FieldDef, FieldType,
    ReplaceFn, SerialKind, OTHER_TAG,
};
pub use object::{
    HashKind, HeapObject, Instance, ListKind, MapBody, ObjectRef, PrimitiveArray, SetBody,
};
pub use value::{deep_eq, deep_hash, identity, Value};
