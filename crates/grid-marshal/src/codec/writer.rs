// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Encode path.

use super::cursor::DataOutput;
use super::fields::PutFields;
use super::footer::FooterBuilder;
use super::handles::HandleTable;
use super::CodecEnv;
use crate::config::{markers, FLAG_FOOTER};
use crate::descriptor::{ClassDescriptor, Strategy};
use crate::error::{CodecError, CodecResult};
use crate::model::{
    HashKind, HeapObject, Instance, ListKind, MapBody, ObjectRef, PrimitiveArray, SetBody, Value,
};
use std::sync::Arc;

/// Counters of one encode session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EncodeStats {
    /// Heap objects written in full.
    pub objects: usize,
    /// HANDLE references emitted instead of a repeated encoding.
    pub handle_refs: usize,
    /// Objects written with a field-index footer.
    pub footers: usize,
}

struct WriteFrame {
    desc: Arc<ClassDescriptor>,
    put: Option<PutFields>,
    obj_start: usize,
    /// Entries of an indexed object, recorded by the field routines.
    footer: Option<FooterBuilder>,
    /// Bytes written outside `default_write_object`/`write_fields`.
    unindexed_writes: bool,
}

impl WriteFrame {
    fn new(desc: &Arc<ClassDescriptor>, obj_start: usize, footer: Option<FooterBuilder>) -> Self {
        Self {
            desc: Arc::clone(desc),
            put: None,
            obj_start,
            footer,
            unindexed_writes: false,
        }
    }
}

/// Recursive object writer for one encode session.
///
/// Also the context handed to externalizable and custom write routines.
pub struct ObjectWriter<'s> {
    out: &'s mut DataOutput,
    handles: &'s mut HandleTable,
    env: &'s CodecEnv,
    depth: usize,
    // `None` frames belong to externalizable routines, which cannot use the
    // default field layout.
    frames: Vec<Option<WriteFrame>>,
    stats: EncodeStats,
}

impl<'s> ObjectWriter<'s> {
    pub(crate) fn new(
        out: &'s mut DataOutput,
        handles: &'s mut HandleTable,
        env: &'s CodecEnv,
    ) -> Self {
        Self {
            out,
            handles,
            env,
            depth: 0,
            frames: Vec::new(),
            stats: EncodeStats::default(),
        }
    }

    pub fn stats(&self) -> EncodeStats {
        self.stats
    }

    /// Current output offset.
    pub fn offset(&self) -> usize {
        self.out.offset()
    }

    pub fn write_byte(&mut self, v: i8) {
        self.mark_unindexed();
        self.out.write_i8(v);
    }

    pub fn write_short(&mut self, v: i16) {
        self.mark_unindexed();
        self.out.write_i16(v);
    }

    pub fn write_int(&mut self, v: i32) {
        self.mark_unindexed();
        self.out.write_i32(v);
    }

    pub fn write_long(&mut self, v: i64) {
        self.mark_unindexed();
        self.out.write_i64(v);
    }

    pub fn write_float(&mut self, v: f32) {
        self.mark_unindexed();
        self.out.write_f32(v);
    }

    pub fn write_double(&mut self, v: f64) {
        self.mark_unindexed();
        self.out.write_f64(v);
    }

    pub fn write_char(&mut self, v: u16) {
        self.mark_unindexed();
        self.out.write_u16(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.mark_unindexed();
        self.out.write_bool(v);
    }

    pub fn write_utf(&mut self, v: &str) -> CodecResult<()> {
        self.mark_unindexed();
        self.out.write_utf(v)
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.mark_unindexed();
        self.out.write_bytes(bytes);
    }

    /// Write any value, recursing into heap objects.
    pub fn write_object(&mut self, value: &Value) -> CodecResult<()> {
        self.mark_unindexed();
        self.write_value(value).map(|_| ())
    }

    /// Write the current instance's fields in the default layout. Only valid
    /// inside a custom write routine.
    pub fn default_write_object(&mut self, instance: &Instance) -> CodecResult<()> {
        let (desc, obj_start, mut footer) = match self.frames.last_mut() {
            Some(Some(frame)) => (Arc::clone(&frame.desc), frame.obj_start, frame.footer.take()),
            _ => return Err(CodecError::NotActive("write_object")),
        };
        let result = self.write_fields_of(&desc, instance, obj_start, footer.as_mut());
        self.restore_footer(footer);
        result
    }

    /// Staging area for [`Self::write_fields`]. Only valid inside a custom
    /// write routine.
    pub fn put_fields(&mut self) -> CodecResult<&mut PutFields> {
        match self.frames.last_mut() {
            Some(Some(frame)) => {
                let class = frame
                    .desc
                    .class()
                    .cloned()
                    .ok_or_else(|| CodecError::invalid("put_fields on a class-less descriptor"))?;
                Ok(frame.put.get_or_insert_with(|| PutFields::new(&class)))
            }
            _ => Err(CodecError::NotActive("write_object")),
        }
    }

    /// Write the values staged through [`Self::put_fields`].
    pub fn write_fields(&mut self) -> CodecResult<()> {
        let (desc, staged, obj_start, mut footer) = match self.frames.last_mut() {
            Some(Some(frame)) => (
                Arc::clone(&frame.desc),
                frame.put.take(),
                frame.obj_start,
                frame.footer.take(),
            ),
            _ => return Err(CodecError::NotActive("write_object")),
        };
        let result = match staged {
            Some(staged) => {
                self.write_fields_of(&desc, staged.staged(), obj_start, footer.as_mut())
            }
            None => Err(CodecError::invalid("write_fields called before put_fields")),
        };
        self.restore_footer(footer);
        result
    }

    fn restore_footer(&mut self, footer: Option<FooterBuilder>) {
        if let Some(Some(frame)) = self.frames.last_mut() {
            frame.footer = footer;
        }
    }

    /// Flag the active custom frame: its routine wrote outside the field layout.
    fn mark_unindexed(&mut self) {
        if let Some(Some(frame)) = self.frames.last_mut() {
            frame.unindexed_writes = true;
        }
    }

    /// Write a value. Returns the target offset when a HANDLE was emitted.
    pub(crate) fn write_value(&mut self, value: &Value) -> CodecResult<Option<usize>> {
        match value {
            Value::Null => self.out.write_u8(markers::NULL),
            Value::Byte(_)
            | Value::Short(_)
            | Value::Int(_)
            | Value::Long(_)
            | Value::Float(_)
            | Value::Double(_)
            | Value::Char(_)
            | Value::Bool(_) => self.write_primitive(value),
            Value::Str(s) => {
                self.out.write_u8(markers::STRING);
                self.out.write_utf(s)?;
            }
            Value::Enum { class, ordinal } => {
                let known = usize::try_from(*ordinal)
                    .map(|o| o < class.enum_constants().len())
                    .unwrap_or(false);
                if !known {
                    return Err(CodecError::invalid(format!(
                        "{} has no constant with ordinal {}",
                        class.name(),
                        ordinal
                    )));
                }
                let desc = self.descriptor(value)?;
                self.out.write_u8(markers::ENUM);
                self.out.write_i32(desc.type_id());
                self.out.write_i32(*ordinal);
            }
            Value::Class(class) => {
                let desc = self.env.registry.descriptor_for_class(class)?;
                self.out.write_u8(markers::CLASS);
                self.out.write_i32(desc.type_id());
            }
            Value::Object(obj) => return self.write_heap(obj),
        }
        Ok(None)
    }

    fn write_primitive(&mut self, value: &Value) {
        match value {
            Value::Byte(v) => {
                self.out.write_u8(markers::BYTE);
                self.out.write_i8(*v);
            }
            Value::Short(v) => {
                self.out.write_u8(markers::SHORT);
                self.out.write_i16(*v);
            }
            Value::Int(v) => {
                self.out.write_u8(markers::INT);
                self.out.write_i32(*v);
            }
            Value::Long(v) => {
                self.out.write_u8(markers::LONG);
                self.out.write_i64(*v);
            }
            Value::Float(v) => {
                self.out.write_u8(markers::FLOAT);
                self.out.write_f32(*v);
            }
            Value::Double(v) => {
                self.out.write_u8(markers::DOUBLE);
                self.out.write_f64(*v);
            }
            Value::Char(v) => {
                self.out.write_u8(markers::CHAR);
                self.out.write_u16(*v);
            }
            Value::Bool(v) => {
                self.out.write_u8(markers::BOOLEAN);
                self.out.write_bool(*v);
            }
            _ => {}
        }
    }

    fn descriptor(&self, value: &Value) -> CodecResult<Arc<ClassDescriptor>> {
        self.env
            .registry
            .descriptor_for(value)?
            .ok_or_else(|| CodecError::invalid("null has no descriptor"))
    }

    fn write_heap(&mut self, obj: &ObjectRef) -> CodecResult<Option<usize>> {
        if self.depth >= self.env.max_depth {
            return Err(CodecError::DepthExceeded(self.env.max_depth));
        }
        self.depth += 1;
        let result = self.write_heap_inner(obj);
        self.depth -= 1;
        result
    }

    fn write_heap_inner(&mut self, obj: &ObjectRef) -> CodecResult<Option<usize>> {
        let mut current = ObjectRef::clone(obj);
        let mut desc = self.descriptor(&Value::Object(ObjectRef::clone(&current)))?;

        if desc.uses_fallback() {
            self.write_fallback(&desc, &current)?;
            return Ok(None);
        }
        if desc.is_excluded() {
            self.out.write_u8(markers::NULL);
            return Ok(None);
        }
        if let Some(replace) = desc.replace_hook().cloned() {
            match replace(&current) {
                Value::Null => {
                    self.out.write_u8(markers::NULL);
                    return Ok(None);
                }
                Value::Object(substitute) => {
                    if !Arc::ptr_eq(&substitute, &current) {
                        current = substitute;
                        desc = self.descriptor(&Value::Object(ObjectRef::clone(&current)))?;
                        if desc.is_excluded() {
                            self.out.write_u8(markers::NULL);
                            return Ok(None);
                        }
                    }
                }
                other => {
                    return Err(CodecError::unsupported(
                        desc.name(),
                        format!("replace hook returned {}", other.describe()),
                    ))
                }
            }
        }

        let start = self.out.offset();
        if let Some(target) = self.handles.lookup_or_insert(&current, start) {
            let distance = u32::try_from(start - target).map_err(|_| CodecError::WriteFailed {
                offset: start,
                reason: "handle distance exceeds u32".into(),
            })?;
            log::trace!("[codec] handle {} -> {}", start, target);
            self.out.write_u8(markers::HANDLE);
            self.out.write_u32(distance);
            self.stats.handle_refs += 1;
            return Ok(Some(target));
        }
        self.stats.objects += 1;

        // Snapshot so no lock is held while children are written.
        let snapshot = current.read().clone();
        match snapshot {
            HeapObject::Instance(inst) => self.write_instance(&desc, &inst, start)?,
            HeapObject::ObjectArray(items) => {
                self.out.write_u8(markers::OBJ_ARR);
                self.write_values(&items)?;
            }
            HeapObject::PrimitiveArray(arr) => self.write_primitive_array(&arr)?,
            HeapObject::List { kind, items } => {
                self.out.write_u8(match kind {
                    ListKind::ArrayList => markers::ARRAY_LIST,
                    ListKind::LinkedList => markers::LINKED_LIST,
                });
                self.write_values(&items)?;
            }
            HeapObject::Map(map) => self.write_map(&map)?,
            HeapObject::Set(set) => self.write_set(&set)?,
            HeapObject::Date(millis) => {
                self.out.write_u8(markers::DATE);
                self.out.write_i64(millis);
            }
            HeapObject::Properties { defaults, entries } => {
                self.out.write_u8(markers::PROPERTIES);
                self.out.write_bool(defaults.is_some());
                if let Some(defaults) = defaults {
                    self.write_value(&Value::Object(defaults))?;
                }
                self.out.write_len(entries.len())?;
                for (name, value) in &entries {
                    self.out.write_utf(name)?;
                    self.out.write_utf(value)?;
                }
            }
        }
        Ok(None)
    }

    fn write_instance(
        &mut self,
        desc: &Arc<ClassDescriptor>,
        inst: &Instance,
        start: usize,
    ) -> CodecResult<()> {
        match desc.strategy() {
            Strategy::Externalizable(hook) => {
                let hook = Arc::clone(hook);
                self.write_header(desc, 0);
                self.frames.push(None);
                let result = hook.write_external(inst, self);
                self.frames.pop();
                result
            }
            Strategy::CustomMethods(hook) if self.env.index.is_enabled(desc.type_id()) => {
                let hook = Arc::clone(hook);
                let len_at = self.write_footer_header(desc);
                let footer = FooterBuilder::with_capacity(desc.fields().len());
                self.frames
                    .push(Some(WriteFrame::new(desc, start, Some(footer))));
                let result = hook.write_object(inst, self);
                let frame = self.frames.pop().flatten();
                result?;
                match frame {
                    Some(WriteFrame {
                        footer: Some(footer),
                        unindexed_writes: false,
                        ..
                    }) => self.finish_footer(start, len_at, &footer),
                    _ => Err(CodecError::unsupported(
                        desc.name(),
                        "indexed custom write routine wrote data outside its fields",
                    )),
                }
            }
            Strategy::CustomMethods(hook) => {
                let hook = Arc::clone(hook);
                self.write_header(desc, 0);
                self.frames.push(Some(WriteFrame::new(desc, start, None)));
                let result = hook.write_object(inst, self);
                self.frames.pop();
                result
            }
            Strategy::DefaultFields if self.env.index.is_enabled(desc.type_id()) => {
                let len_at = self.write_footer_header(desc);
                let mut footer = FooterBuilder::with_capacity(desc.fields().len());
                self.write_fields_of(desc, inst, start, Some(&mut footer))?;
                self.finish_footer(start, len_at, &footer)
            }
            Strategy::DefaultFields => {
                self.write_header(desc, 0);
                self.write_fields_of(desc, inst, start, None)
            }
            other => Err(CodecError::unsupported(
                desc.name(),
                format!("{} instances cannot be written as objects", other.name()),
            )),
        }
    }

    fn write_header(&mut self, desc: &ClassDescriptor, flags: u8) {
        self.out.write_u8(markers::OBJECT);
        self.out.write_i32(desc.type_id());
        self.out.write_u8(flags);
    }

    /// Header plus a placeholder for the total length; returns its offset.
    fn write_footer_header(&mut self, desc: &ClassDescriptor) -> usize {
        self.write_header(desc, FLAG_FOOTER);
        let len_at = self.out.offset();
        self.out.write_u32(0);
        len_at
    }

    fn finish_footer(
        &mut self,
        start: usize,
        len_at: usize,
        footer: &FooterBuilder,
    ) -> CodecResult<()> {
        footer.write(self.out)?;
        let total =
            u32::try_from(self.out.offset() - start).map_err(|_| CodecError::WriteFailed {
                offset: start,
                reason: "object length exceeds u32".into(),
            })?;
        self.out.patch_u32(len_at, total)?;
        self.stats.footers += 1;
        Ok(())
    }

    /// Fields in descriptor order; primitive fields as tag + raw value,
    /// reference fields recursively.
    fn write_fields_of(
        &mut self,
        desc: &ClassDescriptor,
        inst: &Instance,
        obj_start: usize,
        mut footer: Option<&mut FooterBuilder>,
    ) -> CodecResult<()> {
        for field in desc.fields() {
            let value = field.get(inst);
            if !field.field_type.accepts(value) {
                return Err(CodecError::invalid(format!(
                    "field {}.{} ({:?}) holds {:?}",
                    desc.name(),
                    field.name,
                    field.field_type,
                    value
                )));
            }
            let before = self.out.offset();
            let handle = self.write_value(value)?;
            if let Some(footer) = footer.as_deref_mut() {
                let len = self.out.offset() - before;
                match handle {
                    Some(target) => footer.put_handle(
                        field.id,
                        field.field_type,
                        len,
                        target as i64 - obj_start as i64,
                    )?,
                    None => footer.put(field.id, field.field_type, len)?,
                }
            }
        }
        Ok(())
    }

    fn write_values(&mut self, items: &[Value]) -> CodecResult<()> {
        self.out.write_len(items.len())?;
        for item in items {
            self.write_value(item)?;
        }
        Ok(())
    }

    fn write_map(&mut self, map: &MapBody) -> CodecResult<()> {
        match map.kind {
            HashKind::Hash => {
                self.out.write_u8(markers::HASH_MAP);
                self.out.write_len(map.entries.len())?;
                self.out.write_f32(map.load_factor);
            }
            HashKind::Linked => {
                self.out.write_u8(markers::LINKED_HASH_MAP);
                self.out.write_len(map.entries.len())?;
                self.out.write_f32(map.load_factor);
                self.out.write_bool(map.access_order);
            }
        }
        for (key, value) in &map.entries {
            self.write_value(key)?;
            self.write_value(value)?;
        }
        Ok(())
    }

    /// Sets encode like their backing map, keys only.
    fn write_set(&mut self, set: &SetBody) -> CodecResult<()> {
        match set.kind {
            HashKind::Hash => {
                self.out.write_u8(markers::HASH_SET);
                self.out.write_len(set.items.len())?;
                self.out.write_f32(set.load_factor);
            }
            HashKind::Linked => {
                self.out.write_u8(markers::LINKED_HASH_SET);
                self.out.write_len(set.items.len())?;
                self.out.write_f32(set.load_factor);
                self.out.write_bool(false);
            }
        }
        for item in &set.items {
            self.write_value(item)?;
        }
        Ok(())
    }

    fn write_primitive_array(&mut self, arr: &PrimitiveArray) -> CodecResult<()> {
        let out = &mut *self.out;
        match arr {
            PrimitiveArray::Byte(v) => {
                out.write_u8(markers::BYTE_ARR);
                out.write_len(v.len())?;
                out.write_bytes(v);
            }
            PrimitiveArray::Short(v) => {
                out.write_u8(markers::SHORT_ARR);
                out.write_len(v.len())?;
                v.iter().for_each(|x| out.write_i16(*x));
            }
            PrimitiveArray::Int(v) => {
                out.write_u8(markers::INT_ARR);
                out.write_len(v.len())?;
                v.iter().for_each(|x| out.write_i32(*x));
            }
            PrimitiveArray::Long(v) => {
                out.write_u8(markers::LONG_ARR);
                out.write_len(v.len())?;
                v.iter().for_each(|x| out.write_i64(*x));
            }
            PrimitiveArray::Float(v) => {
                out.write_u8(markers::FLOAT_ARR);
                out.write_len(v.len())?;
                v.iter().for_each(|x| out.write_f32(*x));
            }
            PrimitiveArray::Double(v) => {
                out.write_u8(markers::DOUBLE_ARR);
                out.write_len(v.len())?;
                v.iter().for_each(|x| out.write_f64(*x));
            }
            PrimitiveArray::Char(v) => {
                out.write_u8(markers::CHAR_ARR);
                out.write_len(v.len())?;
                v.iter().for_each(|x| out.write_u16(*x));
            }
            PrimitiveArray::Bool(v) => {
                out.write_u8(markers::BOOLEAN_ARR);
                out.write_len(v.len())?;
                v.iter().for_each(|x| out.write_bool(*x));
            }
        }
        Ok(())
    }

    /// Throwables: type id + length-prefixed bytes from the fallback marshaller.
    fn write_fallback(&mut self, desc: &ClassDescriptor, obj: &ObjectRef) -> CodecResult<()> {
        let inst = match &*obj.read() {
            HeapObject::Instance(inst) => inst.clone(),
            other => {
                return Err(CodecError::unsupported(
                    other.kind_name(),
                    "fallback marshalling requires an instance",
                ))
            }
        };
        let bytes = self.env.fallback.marshal(&inst)?;
        self.out.write_u8(markers::FALLBACK);
        self.out.write_i32(desc.type_id());
        self.out.write_len(bytes.len())?;
        self.out.write_bytes(&bytes);
        Ok(())
    }
}
