// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime class definitions.

use super::object::{Instance, ObjectRef};
use super::value::Value;
use crate::codec::{ObjectReader, ObjectWriter};
use crate::config::markers;
use crate::error::CodecResult;
use std::fmt;
use std::sync::Arc;

/// Declared type of a field slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    Boolean,
    /// Any reference type (strings, objects, arrays, collections).
    Other,
}

/// Footer tag of reference-typed fields.
pub const OTHER_TAG: u8 = 0x7F;

impl FieldType {
    /// Tag byte written in front of primitive field values and in footer entries.
    pub fn tag(self) -> u8 {
        match self {
            Self::Byte => markers::BYTE,
            Self::Short => markers::SHORT,
            Self::Int => markers::INT,
            Self::Long => markers::LONG,
            Self::Float => markers::FLOAT,
            Self::Double => markers::DOUBLE,
            Self::Char => markers::CHAR,
            Self::Boolean => markers::BOOLEAN,
            Self::Other => OTHER_TAG,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            markers::BYTE => Self::Byte,
            markers::SHORT => Self::Short,
            markers::INT => Self::Int,
            markers::LONG => Self::Long,
            markers::FLOAT => Self::Float,
            markers::DOUBLE => Self::Double,
            markers::CHAR => Self::Char,
            markers::BOOLEAN => Self::Boolean,
            OTHER_TAG => Self::Other,
            _ => return None,
        })
    }

    /// Fixed width of the raw value, `None` for reference fields.
    pub fn width(self) -> Option<usize> {
        match self {
            Self::Byte | Self::Boolean => Some(1),
            Self::Short | Self::Char => Some(2),
            Self::Int | Self::Float => Some(4),
            Self::Long | Self::Double => Some(8),
            Self::Other => None,
        }
    }

    pub fn is_primitive(self) -> bool {
        !matches!(self, Self::Other)
    }

    /// Zero value a fresh instance starts with.
    pub fn default_value(self) -> Value {
        match self {
            Self::Byte => Value::Byte(0),
            Self::Short => Value::Short(0),
            Self::Int => Value::Int(0),
            Self::Long => Value::Long(0),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::Char => Value::Char(0),
            Self::Boolean => Value::Bool(false),
            Self::Other => Value::Null,
        }
    }

    /// True if `value` can be stored in a slot of this type. Reference slots
    /// take anything, including boxed primitives.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Byte, Value::Byte(_))
                | (Self::Short, Value::Short(_))
                | (Self::Int, Value::Int(_))
                | (Self::Long, Value::Long(_))
                | (Self::Float, Value::Float(_))
                | (Self::Double, Value::Double(_))
                | (Self::Char, Value::Char(_))
                | (Self::Boolean, Value::Bool(_))
        ) || self == Self::Other
    }
}

/// Field declared on a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: Arc<str>,
    pub field_type: FieldType,
}

/// Type that writes and reads its whole state itself.
pub trait Externalizable: Send + Sync {
    fn write_external(&self, instance: &Instance, out: &mut ObjectWriter<'_>) -> CodecResult<()>;

    fn read_external(&self, instance: &mut Instance, input: &mut ObjectReader<'_>)
        -> CodecResult<()>;
}

/// Type with its own write/read routines that may fall back to the default
/// field layout through [`ObjectWriter::default_write_object`] and
/// [`ObjectReader::default_read_object`].
pub trait CustomSerialization: Send + Sync {
    fn write_object(&self, instance: &Instance, out: &mut ObjectWriter<'_>) -> CodecResult<()>;

    fn read_object(&self, instance: &mut Instance, input: &mut ObjectReader<'_>)
        -> CodecResult<()>;
}

/// Write-time substitution hook. Must return `Value::Null` or `Value::Object`.
pub type ReplaceFn = Arc<dyn Fn(&ObjectRef) -> Value + Send + Sync>;

/// How instances of a class are encoded.
#[derive(Clone)]
pub enum SerialKind {
    DefaultFields,
    Externalizable(Arc<dyn Externalizable>),
    Custom(Arc<dyn CustomSerialization>),
    /// Enum class with its constant names, in ordinal order.
    Enum(Vec<Arc<str>>),
}

impl fmt::Debug for SerialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DefaultFields => f.write_str("DefaultFields"),
            Self::Externalizable(_) => f.write_str("Externalizable"),
            Self::Custom(_) => f.write_str("Custom"),
            Self::Enum(constants) => f.debug_tuple("Enum").field(constants).finish(),
        }
    }
}

/// A runtime class: the unit the descriptor registry keys on.
pub struct ClassDef {
    name: Arc<str>,
    fields: Vec<FieldDef>,
    kind: SerialKind,
    excluded: bool,
    throwable: bool,
    internal: bool,
    replace: Option<ReplaceFn>,
}

impl ClassDef {
    pub fn builder(name: impl Into<Arc<str>>) -> ClassDefBuilder {
        ClassDefBuilder {
            def: ClassDef {
                name: name.into(),
                fields: Vec::new(),
                kind: SerialKind::DefaultFields,
                excluded: false,
                throwable: false,
                internal: false,
                replace: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Declared fields, in declaration order (the slot order of [`Instance`]).
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn slot_of(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| &*f.name == field)
    }

    pub fn kind(&self) -> &SerialKind {
        &self.kind
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, SerialKind::Enum(_))
    }

    pub fn enum_constants(&self) -> &[Arc<str>] {
        match &self.kind {
            SerialKind::Enum(constants) => constants,
            _ => &[],
        }
    }

    /// Excluded classes always encode as NULL.
    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    pub fn is_throwable(&self) -> bool {
        self.throwable
    }

    /// Internal marker types are hidden from user-visible key enumeration.
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn replace_hook(&self) -> Option<&ReplaceFn> {
        self.replace.as_ref()
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("kind", &self.kind)
            .field("excluded", &self.excluded)
            .field("throwable", &self.throwable)
            .field("internal", &self.internal)
            .field("replace", &self.replace.is_some())
            .finish()
    }
}

/// Fluent builder for [`ClassDef`].
pub struct ClassDefBuilder {
    def: ClassDef,
}

impl ClassDefBuilder {
    pub fn field(mut self, name: impl Into<Arc<str>>, field_type: FieldType) -> Self {
        self.def.fields.push(FieldDef {
            name: name.into(),
            field_type,
        });
        self
    }

    pub fn externalizable(mut self, hook: Arc<dyn Externalizable>) -> Self {
        self.def.kind = SerialKind::Externalizable(hook);
        self
    }

    pub fn custom(mut self, hook: Arc<dyn CustomSerialization>) -> Self {
        self.def.kind = SerialKind::Custom(hook);
        self
    }

    pub fn enum_constants<I, S>(mut self, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.def.kind = SerialKind::Enum(constants.into_iter().map(Into::into).collect());
        self
    }

    pub fn excluded(mut self) -> Self {
        self.def.excluded = true;
        self
    }

    pub fn throwable(mut self) -> Self {
        self.def.throwable = true;
        self
    }

    pub fn internal(mut self) -> Self {
        self.def.internal = true;
        self
    }

    pub fn replace_with<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ObjectRef) -> Value + Send + Sync + 'static,
    {
        self.def.replace = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Arc<ClassDef> {
        Arc::new(self.def)
    }
}
