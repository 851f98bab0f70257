// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Class descriptors
//!
//! A [`ClassDescriptor`] is the cached, immutable answer to "how is this type
//! encoded": stable type id, field layout ordered by name, and the
//! [`Strategy`] the codec dispatches on. Descriptors are created once per type
//! by the [`ClassDescriptorRegistry`] and shared by every session.

mod ids;
mod loader;
mod registry;

pub use ids::{field_id, stable_id, type_id};
pub use loader::{ClassCatalog, ClassLoader};
pub use registry::{ClassDescriptorRegistry, TypeKey};

use crate::error::{CodecError, CodecResult};
use crate::model::{
    ClassDef, CustomSerialization, Externalizable, FieldType, Instance, ReplaceFn, SerialKind,
    Value,
};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Standard types with dedicated encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
    ArrayList,
    LinkedList,
    HashMap,
    HashSet,
    LinkedHashMap,
    LinkedHashSet,
    Date,
    Properties,
}

/// Encoding strategy selected for a type.
#[derive(Clone)]
pub enum Strategy {
    Primitive(FieldType),
    String,
    Enum,
    /// Object or primitive array.
    Array,
    /// Class literal.
    Class,
    Builtin(BuiltinKind),
    Externalizable(Arc<dyn Externalizable>),
    CustomMethods(Arc<dyn CustomSerialization>),
    DefaultFields,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Primitive(_) => "PRIMITIVE",
            Self::String => "STRING",
            Self::Enum => "ENUM",
            Self::Array => "ARRAY",
            Self::Class => "CLASS",
            Self::Builtin(_) => "BUILTIN",
            Self::Externalizable(_) => "EXTERNALIZABLE",
            Self::CustomMethods(_) => "CUSTOM_METHODS",
            Self::DefaultFields => "DEFAULT_FIELDS",
        }
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(ft) => write!(f, "PRIMITIVE({:?})", ft),
            Self::Builtin(kind) => write!(f, "BUILTIN({:?})", kind),
            other => f.write_str(other.name()),
        }
    }
}

/// Field layout entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub id: i32,
    pub field_type: FieldType,
    pub name: Arc<str>,
    /// Slot index into [`Instance`] values; the field accessor.
    pub slot: usize,
}

impl FieldInfo {
    pub fn get<'a>(&self, instance: &'a Instance) -> &'a Value {
        instance.slot(self.slot).unwrap_or(&Value::Null)
    }

    pub fn set(&self, instance: &mut Instance, value: Value) -> CodecResult<()> {
        instance.set_slot(self.slot, value)
    }
}

/// Immutable per-type encoding metadata.
#[derive(Clone)]
pub struct ClassDescriptor {
    type_id: i32,
    name: Arc<str>,
    fields: Vec<FieldInfo>,
    strategy: Strategy,
    class: Option<Arc<ClassDef>>,
    excluded: bool,
    throwable: bool,
    replace: Option<ReplaceFn>,
}

impl ClassDescriptor {
    pub(crate) fn builtin(name: &'static str, strategy: Strategy) -> Self {
        Self {
            type_id: type_id(name),
            name: Arc::from(name),
            fields: Vec::new(),
            strategy,
            class: None,
            excluded: false,
            throwable: false,
            replace: None,
        }
    }

    /// Resolve a user class: enum, then externalizable, then custom methods,
    /// else the default field layout.
    pub(crate) fn for_class(class: &Arc<ClassDef>) -> CodecResult<Self> {
        let strategy = match class.kind() {
            SerialKind::Enum(_) => Strategy::Enum,
            SerialKind::Externalizable(hook) => Strategy::Externalizable(Arc::clone(hook)),
            SerialKind::Custom(hook) => Strategy::CustomMethods(Arc::clone(hook)),
            SerialKind::DefaultFields => Strategy::DefaultFields,
        };

        let mut fields: Vec<FieldInfo> = class
            .fields()
            .iter()
            .enumerate()
            .map(|(slot, def)| FieldInfo {
                id: field_id(&def.name),
                field_type: def.field_type,
                name: Arc::clone(&def.name),
                slot,
            })
            .collect();
        fields.sort_by(|a, b| a.name.cmp(&b.name));

        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.id) {
                return Err(CodecError::unsupported(
                    class.name(),
                    format!("duplicate field id {} (field {})", field.id, field.name),
                ));
            }
        }

        Ok(Self {
            type_id: type_id(class.name()),
            name: class.name_arc(),
            fields,
            strategy,
            class: Some(Arc::clone(class)),
            excluded: class.is_excluded(),
            throwable: class.is_throwable(),
            replace: class.replace_hook().cloned(),
        })
    }

    pub fn type_id(&self) -> i32 {
        self.type_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields ordered by name.
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| &*f.name == name)
    }

    pub fn field_by_id(&self, id: i32) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn class(&self) -> Option<&Arc<ClassDef>> {
        self.class.as_ref()
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    /// Throwables without their own encoding go through the fallback marshaller.
    pub fn uses_fallback(&self) -> bool {
        self.throwable && !matches!(self.strategy, Strategy::Externalizable(_))
    }

    pub fn replace_hook(&self) -> Option<&ReplaceFn> {
        self.replace.as_ref()
    }

    /// Classes whose fields go through the default layout can carry a
    /// field-index footer, custom routines included.
    pub fn fields_indexing_supported(&self) -> bool {
        matches!(
            self.strategy,
            Strategy::DefaultFields | Strategy::CustomMethods(_)
        )
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("type_id", &self.type_id)
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .field("fields", &self.fields)
            .finish()
    }
}
