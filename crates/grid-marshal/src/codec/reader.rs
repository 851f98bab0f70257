// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decode path.

use super::cursor::DataInput;
use super::fields::GetFields;
use super::handles::HandleReplay;
use super::CodecEnv;
use crate::config::{markers, FLAG_FOOTER};
use crate::descriptor::{ClassDescriptor, ClassLoader, Strategy};
use crate::error::{CodecError, CodecResult};
use crate::model::{
    ClassDef, FieldType, HashKind, HeapObject, Instance, ListKind, MapBody, ObjectRef,
    PrimitiveArray, SetBody, Value,
};
use parking_lot::RwLock;
use std::sync::Arc;

/// Recursive object reader for one decode session.
///
/// Also the context handed to externalizable and custom read routines.
pub struct ObjectReader<'s> {
    input: DataInput<'s>,
    replay: &'s mut HandleReplay,
    env: &'s CodecEnv,
    loader: &'s dyn ClassLoader,
    depth: usize,
    frames: Vec<Option<Arc<ClassDescriptor>>>,
}

impl<'s> ObjectReader<'s> {
    pub(crate) fn new(
        input: DataInput<'s>,
        replay: &'s mut HandleReplay,
        env: &'s CodecEnv,
        loader: &'s dyn ClassLoader,
    ) -> Self {
        Self {
            input,
            replay,
            env,
            loader,
            depth: 0,
            frames: Vec::new(),
        }
    }

    pub fn offset(&self) -> usize {
        self.input.offset()
    }

    pub fn loader(&self) -> &dyn ClassLoader {
        self.loader
    }

    pub fn read_byte(&mut self) -> CodecResult<i8> {
        self.input.read_i8()
    }

    pub fn read_short(&mut self) -> CodecResult<i16> {
        self.input.read_i16()
    }

    pub fn read_int(&mut self) -> CodecResult<i32> {
        self.input.read_i32()
    }

    pub fn read_long(&mut self) -> CodecResult<i64> {
        self.input.read_i64()
    }

    pub fn read_float(&mut self) -> CodecResult<f32> {
        self.input.read_f32()
    }

    pub fn read_double(&mut self) -> CodecResult<f64> {
        self.input.read_f64()
    }

    pub fn read_char(&mut self) -> CodecResult<u16> {
        self.input.read_u16()
    }

    pub fn read_bool(&mut self) -> CodecResult<bool> {
        self.input.read_bool()
    }

    pub fn read_utf(&mut self) -> CodecResult<String> {
        self.input.read_utf()
    }

    pub fn read_raw(&mut self, len: usize) -> CodecResult<&'s [u8]> {
        self.input.read_bytes(len)
    }

    /// Read any value written by [`super::ObjectWriter::write_object`].
    pub fn read_object(&mut self) -> CodecResult<Value> {
        self.read_value()
    }

    /// Read fields in the default layout into `instance`. Only valid inside a
    /// custom read routine.
    pub fn default_read_object(&mut self, instance: &mut Instance) -> CodecResult<()> {
        let desc = self.active_frame()?;
        self.read_fields_into(&desc, instance)
    }

    /// Read fields in the default layout into a detached field set. Only valid
    /// inside a custom read routine.
    pub fn read_fields(&mut self) -> CodecResult<GetFields> {
        let desc = self.active_frame()?;
        let class = desc
            .class()
            .ok_or_else(|| CodecError::invalid("read_fields on a class-less descriptor"))?;
        let mut read = Instance::new(class);
        self.read_fields_into(&desc, &mut read)?;
        Ok(GetFields::new(read))
    }

    fn active_frame(&self) -> CodecResult<Arc<ClassDescriptor>> {
        match self.frames.last() {
            Some(Some(desc)) => Ok(Arc::clone(desc)),
            _ => Err(CodecError::NotActive("read_object")),
        }
    }

    pub(crate) fn read_value(&mut self) -> CodecResult<Value> {
        let pos = self.input.offset();
        let marker = self.input.read_u8()?;
        match marker {
            markers::NULL => Ok(Value::Null),
            markers::HANDLE => {
                let distance = self.input.read_u32()? as usize;
                let target = pos
                    .checked_sub(distance)
                    .filter(|&t| t >= self.input.start() && distance > 0)
                    .ok_or(CodecError::DanglingHandle {
                        offset: pos,
                        target: pos as i64 - distance as i64,
                    })?;
                self.resolve_handle(target)
            }
            markers::FALLBACK => self.read_fallback(),
            markers::BYTE..=markers::BOOLEAN => self.read_primitive(marker),
            markers::STRING => Ok(Value::from(self.input.read_utf()?)),
            markers::ENUM => {
                let type_id = self.input.read_i32()?;
                let class = self.load_class(type_id)?;
                let ordinal = self.input.read_i32()?;
                let known = usize::try_from(ordinal)
                    .map(|o| o < class.enum_constants().len())
                    .unwrap_or(false);
                if !class.is_enum() || !known {
                    return Err(CodecError::invalid(format!(
                        "{} has no enum constant with ordinal {}",
                        class.name(),
                        ordinal
                    )));
                }
                Ok(Value::Enum { class, ordinal })
            }
            markers::CLASS => {
                let type_id = self.input.read_i32()?;
                Ok(Value::Class(self.load_class(type_id)?))
            }
            markers::BYTE_ARR..=markers::OBJ_ARR
            | markers::ARRAY_LIST..=markers::PROPERTIES
            | markers::OBJECT => self.read_heap(marker, pos),
            other => Err(CodecError::UnknownMarker {
                marker: other,
                offset: pos,
            }),
        }
    }

    /// Replay hit, or decode the target in place when the window starts past
    /// the target's first encoding.
    fn resolve_handle(&mut self, target: usize) -> CodecResult<Value> {
        if let Some(hit) = self.replay.get(target) {
            return Ok(hit.clone());
        }
        let resume = self.input.offset();
        self.input.seek(target)?;
        let value = self.read_value();
        self.input.seek(resume)?;
        value
    }

    fn read_primitive(&mut self, tag: u8) -> CodecResult<Value> {
        Ok(match tag {
            markers::BYTE => Value::Byte(self.input.read_i8()?),
            markers::SHORT => Value::Short(self.input.read_i16()?),
            markers::INT => Value::Int(self.input.read_i32()?),
            markers::LONG => Value::Long(self.input.read_i64()?),
            markers::FLOAT => Value::Float(self.input.read_f32()?),
            markers::DOUBLE => Value::Double(self.input.read_f64()?),
            markers::CHAR => Value::Char(self.input.read_u16()?),
            markers::BOOLEAN => Value::Bool(self.input.read_bool()?),
            other => {
                return Err(CodecError::UnknownMarker {
                    marker: other,
                    offset: self.input.offset().saturating_sub(1),
                })
            }
        })
    }

    fn load_class(&self, type_id: i32) -> CodecResult<Arc<ClassDef>> {
        self.loader
            .load(type_id)
            .ok_or(CodecError::UnresolvedClass { type_id })
    }

    fn read_heap(&mut self, marker: u8, pos: usize) -> CodecResult<Value> {
        if self.depth >= self.env.max_depth {
            return Err(CodecError::DepthExceeded(self.env.max_depth));
        }
        self.depth += 1;
        let result = self.read_heap_inner(marker, pos);
        self.depth -= 1;
        result
    }

    /// Allocate the node and register it before reading children, so
    /// back-references to it resolve to the same instance.
    fn alloc(&mut self, pos: usize, placeholder: HeapObject) -> ObjectRef {
        let obj: ObjectRef = Arc::new(RwLock::new(placeholder));
        self.replay.register(pos, Value::Object(ObjectRef::clone(&obj)));
        obj
    }

    fn read_heap_inner(&mut self, marker: u8, pos: usize) -> CodecResult<Value> {
        let obj = match marker {
            markers::OBJECT => return self.read_instance(pos),
            markers::OBJ_ARR => {
                let obj = self.alloc(pos, HeapObject::ObjectArray(Vec::new()));
                let items = self.read_values()?;
                *obj.write() = HeapObject::ObjectArray(items);
                obj
            }
            markers::ARRAY_LIST | markers::LINKED_LIST => {
                let kind = if marker == markers::ARRAY_LIST {
                    ListKind::ArrayList
                } else {
                    ListKind::LinkedList
                };
                let obj = self.alloc(pos, HeapObject::list(kind, Vec::new()));
                let items = self.read_values()?;
                *obj.write() = HeapObject::List { kind, items };
                obj
            }
            markers::HASH_MAP | markers::LINKED_HASH_MAP => {
                let kind = if marker == markers::HASH_MAP {
                    HashKind::Hash
                } else {
                    HashKind::Linked
                };
                let obj = self.alloc(pos, HeapObject::Map(MapBody::new(kind)));
                let size = self.input.read_count(2)?;
                let mut map = MapBody::new(kind).with_load_factor(self.input.read_f32()?);
                if kind == HashKind::Linked {
                    map.access_order = self.input.read_bool()?;
                }
                map.entries.reserve(size);
                for _ in 0..size {
                    let key = self.read_value()?;
                    let value = self.read_value()?;
                    map.entries.push((key, value));
                }
                *obj.write() = HeapObject::Map(map);
                obj
            }
            markers::HASH_SET | markers::LINKED_HASH_SET => {
                let kind = if marker == markers::HASH_SET {
                    HashKind::Hash
                } else {
                    HashKind::Linked
                };
                let obj = self.alloc(pos, HeapObject::Set(SetBody::new(kind)));
                let size = self.input.read_count(1)?;
                let mut set = SetBody::new(kind);
                set.load_factor = self.input.read_f32()?;
                if kind == HashKind::Linked {
                    // Access order is meaningless for sets; always false.
                    self.input.read_bool()?;
                }
                set.items.reserve(size);
                for _ in 0..size {
                    set.items.push(self.read_value()?);
                }
                *obj.write() = HeapObject::Set(set);
                obj
            }
            markers::DATE => {
                let millis = self.input.read_i64()?;
                self.alloc(pos, HeapObject::Date(millis))
            }
            markers::PROPERTIES => {
                let obj = self.alloc(
                    pos,
                    HeapObject::Properties {
                        defaults: None,
                        entries: Vec::new(),
                    },
                );
                let defaults = if self.input.read_bool()? {
                    match self.read_value()? {
                        Value::Object(defaults) => Some(defaults),
                        Value::Null => None,
                        other => {
                            return Err(CodecError::invalid(format!(
                                "properties defaults decoded as {}",
                                other.describe()
                            )))
                        }
                    }
                } else {
                    None
                };
                let count = self.input.read_count(8)?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let name = self.input.read_utf()?;
                    let value = self.input.read_utf()?;
                    entries.push((name, value));
                }
                *obj.write() = HeapObject::Properties { defaults, entries };
                obj
            }
            _ => {
                let arr = self.read_primitive_array(marker)?;
                self.alloc(pos, HeapObject::PrimitiveArray(arr))
            }
        };
        Ok(Value::Object(obj))
    }

    fn read_values(&mut self) -> CodecResult<Vec<Value>> {
        let len = self.input.read_count(1)?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.read_value()?);
        }
        Ok(items)
    }

    fn read_primitive_array(&mut self, marker: u8) -> CodecResult<PrimitiveArray> {
        macro_rules! read_vec {
            ($variant:ident, $read:ident, $size:expr) => {{
                let len = self.input.read_count($size)?;
                let mut v = Vec::with_capacity(len);
                for _ in 0..len {
                    v.push(self.input.$read()?);
                }
                PrimitiveArray::$variant(v)
            }};
        }
        Ok(match marker {
            markers::BYTE_ARR => {
                let len = self.input.read_count(1)?;
                PrimitiveArray::Byte(self.input.read_bytes(len)?.to_vec())
            }
            markers::SHORT_ARR => read_vec!(Short, read_i16, 2),
            markers::INT_ARR => read_vec!(Int, read_i32, 4),
            markers::LONG_ARR => read_vec!(Long, read_i64, 8),
            markers::FLOAT_ARR => read_vec!(Float, read_f32, 4),
            markers::DOUBLE_ARR => read_vec!(Double, read_f64, 8),
            markers::CHAR_ARR => read_vec!(Char, read_u16, 2),
            markers::BOOLEAN_ARR => read_vec!(Bool, read_bool, 1),
            other => {
                return Err(CodecError::UnknownMarker {
                    marker: other,
                    offset: self.input.offset().saturating_sub(1),
                })
            }
        })
    }

    fn read_instance(&mut self, pos: usize) -> CodecResult<Value> {
        let type_id = self.input.read_i32()?;
        let class = self.load_class(type_id)?;
        let flags = self.input.read_u8()?;
        let desc = self.env.registry.descriptor_for_class(&class)?;
        let total_len = if flags & FLAG_FOOTER != 0 {
            if !desc.fields_indexing_supported() {
                return Err(CodecError::CorruptFooter(format!(
                    "footer flag on {} which uses {}",
                    desc.name(),
                    desc.strategy().name()
                )));
            }
            Some(self.input.read_u32()? as usize)
        } else {
            None
        };

        let obj = self.alloc(pos, HeapObject::Instance(Instance::new(&class)));
        let mut inst = Instance::new(&class);
        match desc.strategy() {
            Strategy::DefaultFields => self.read_fields_into(&desc, &mut inst)?,
            Strategy::Externalizable(hook) => {
                let hook = Arc::clone(hook);
                self.frames.push(None);
                let result = hook.read_external(&mut inst, self);
                self.frames.pop();
                result?;
            }
            Strategy::CustomMethods(hook) => {
                let hook = Arc::clone(hook);
                self.frames.push(Some(Arc::clone(&desc)));
                let result = hook.read_object(&mut inst, self);
                self.frames.pop();
                result?;
            }
            other => {
                return Err(CodecError::unsupported(
                    desc.name(),
                    format!("{} instances cannot be read as objects", other.name()),
                ))
            }
        }

        // Footer is a trailer; full decoding skips it.
        if let Some(total) = total_len {
            let end = pos.checked_add(total).filter(|&end| end >= self.input.offset());
            match end {
                Some(end) => self.input.seek(end)?,
                None => {
                    return Err(CodecError::CorruptFooter(format!(
                        "object length {} shorter than its fields",
                        total
                    )))
                }
            }
        }
        *obj.write() = HeapObject::Instance(inst);
        Ok(Value::Object(obj))
    }

    fn read_fields_into(&mut self, desc: &ClassDescriptor, inst: &mut Instance) -> CodecResult<()> {
        for field in desc.fields() {
            let at = self.input.offset();
            let value = self.read_value()?;
            if field.field_type != FieldType::Other && !field.field_type.accepts(&value) {
                return Err(CodecError::invalid(format!(
                    "field {}.{} expects {:?}, found {:?} at offset {}",
                    desc.name(),
                    field.name,
                    field.field_type,
                    value,
                    at
                )));
            }
            field.set(inst, value)?;
        }
        Ok(())
    }

    fn read_fallback(&mut self) -> CodecResult<Value> {
        let type_id = self.input.read_i32()?;
        let class = self.load_class(type_id)?;
        let len = self.input.read_count(1)?;
        let bytes = self.input.read_bytes(len)?;
        let inst = self.env.fallback.unmarshal(&class, bytes, self.loader)?;
        Ok(Value::object(HeapObject::Instance(inst)))
    }
}
