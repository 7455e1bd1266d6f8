//! The Encoder Runtime (§4.D): a streaming builder over a strict
//! nesting discipline (`start`/`set`/`push`/`end`/`cancel`) that
//! produces one contiguous, self-consistent buffer with no patch-up
//! pass (§4.D "Linearization").
//!
//! Tables reserve their fixed-size bitmap+slot region *immediately* at
//! `start`, zero-filled, so fields can be set in any order against
//! fixed slot positions. Vectors defer their header and entries to
//! `end`, because a table-vector's elements may themselves be whole
//! tables built in between `start` and `end` (see SPEC_FULL.md §6) —
//! writing the header eagerly would leave the entries array
//! non-contiguous with it. Every scope remembers the buffer position
//! it started at; `cancel` is always a truncation back to that
//! position, which is what makes "cancel is erasing" (spec invariant
//! #5) hold uniformly.

use crate::error::{Error, Result};
use crate::schema::{FieldType, Schema, TableDef};
use crate::wire::{self, OFFSET_SIZE};

#[derive(Debug)]
enum Scope<'s> {
    Table {
        def: &'s TableDef,
        start: usize,
    },
    Vector {
        kind: VectorKind,
        start: usize,
        count: u64,
        data: Vec<u8>,
    },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum VectorKind {
    Scalar(u8),
    StringOffsets,
    TableOffsets,
}

impl VectorKind {
    fn has_length_field(self) -> bool {
        !matches!(self, VectorKind::TableOffsets)
    }

    fn name(self) -> &'static str {
        match self {
            VectorKind::Scalar(_) => "scalar vector",
            VectorKind::StringOffsets => "string vector",
            VectorKind::TableOffsets => "table vector",
        }
    }
}

pub struct Encoder<'s> {
    schema: &'s Schema,
    buf: Vec<u8>,
    stack: Vec<Scope<'s>>,
    error: Option<Error>,
    root_start: Option<usize>,
}

impl<'s> Encoder<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Encoder {
            schema,
            buf: Vec::new(),
            stack: Vec::new(),
            error: None,
            root_start: None,
        }
    }

    /// Discard any in-progress session and poisoned error, reusing the
    /// allocation. Mirrors the teacher's `into_alloc`/stack-reuse
    /// pattern (`coder::coder::CoderState::into_alloc`).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.stack.clear();
        self.error = None;
        self.root_start = None;
    }

    fn fail(&mut self, err: Error) -> Error {
        if self.error.is_none() {
            self.error = Some(err.clone());
        }
        self.error.clone().unwrap()
    }

    fn check_poison(&self) -> Result<()> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn misuse(&mut self, expected: impl Into<String>, actual: impl Into<String>) -> Error {
        self.fail(Error::EncoderMisuse {
            expected: expected.into(),
            actual: actual.into(),
        })
    }

    fn table_scope(&mut self, op: &str) -> Result<(&'s TableDef, usize)> {
        match self.stack.last() {
            Some(&Scope::Table { def, start }) => Ok((def, start)),
            Some(Scope::Vector { kind, .. }) => {
                let actual = kind.name().to_string();
                Err(self.misuse(format!("a table (for {op})"), actual))
            }
            None => Err(self.misuse(format!("a table (for {op})"), "no open scope")),
        }
    }

    fn field<'a>(&mut self, def: &'a TableDef, name: &str, op: &str) -> Result<(usize, &'a crate::schema::FieldDef)> {
        match def.field_index(name) {
            Some(idx) => Ok((idx, &def.fields[idx])),
            None => Err(self.misuse(
                format!("a field of table {:?} (for {op})", def.name),
                format!("unknown field {name:?}"),
            )),
        }
    }

    fn slot_pos(&self, table_start: usize, def: &TableDef, idx: usize) -> usize {
        table_start + def.bitmap_len() + def.slot_offset(idx, self.schema)
    }

    fn mark_present(&mut self, table_start: usize, idx: usize) {
        wire::bit_set(&mut self.buf[table_start..], idx);
    }

    // ---- table scopes ----

    /// Begin the root (output) table. Must be the very first scope
    /// opened on a fresh encoder, guaranteeing it lands at offset 0.
    pub fn start_output(&mut self) -> Result<()> {
        self.check_poison()?;
        if !self.stack.is_empty() {
            return Err(self.misuse("an idle encoder", "a scope is already open"));
        }
        let idx = self.schema.root_index();
        let def = self.schema.table(idx);
        let start = self.reserve_table(def);
        self.root_start = Some(start);
        self.stack.push(Scope::Table { def, start });
        Ok(())
    }

    /// Begin a nested table, by name, as a fresh scope. The caller
    /// binds its returned offset into a parent field (`set_table`) or
    /// pushes it into a table vector (`push_table`) once it ends.
    pub fn start_table(&mut self, name: &str) -> Result<()> {
        self.check_poison()?;
        let idx = self.schema.table_index(name).ok_or_else(|| {
            Error::BadArgument {
                message: format!("no such table {name:?} in schema"),
            }
        })?;
        let def = self.schema.table(idx);
        let start = self.reserve_table(def);
        self.stack.push(Scope::Table { def, start });
        Ok(())
    }

    fn reserve_table(&mut self, def: &TableDef) -> usize {
        let start = self.buf.len();
        let total = def.total_len(self.schema);
        self.buf.resize(start + total, 0);
        start
    }

    /// End the table at the top of the stack, returning its absolute
    /// offset. Legal even if no field was ever set.
    pub fn end_table(&mut self) -> Result<u64> {
        self.check_poison()?;
        match self.stack.pop() {
            Some(Scope::Table { start, .. }) => Ok(start as u64),
            Some(other) => {
                self.stack.push(other);
                Err(self.misuse("a table", "top of stack is a vector"))
            }
            None => Err(self.misuse("a table", "no open scope")),
        }
    }

    /// Cancel the table at the top of the stack, rolling the buffer
    /// back to its start position (spec invariant #5).
    pub fn cancel_table(&mut self) -> Result<()> {
        self.check_poison()?;
        match self.stack.pop() {
            Some(Scope::Table { start, .. }) => {
                self.buf.truncate(start);
                if self.root_start == Some(start) {
                    self.root_start = None;
                }
                Ok(())
            }
            Some(other) => {
                self.stack.push(other);
                Err(self.misuse("a table", "top of stack is a vector"))
            }
            None => Err(self.misuse("a table", "no open scope")),
        }
    }

    // ---- scalar / enum fields ----

    fn set_int_impl(&mut self, name: &str, value: i64, op: &str) -> Result<()> {
        self.check_poison()?;
        let (def, start) = self.table_scope(op)?;
        let (idx, field) = self.field(def, name, op)?;
        if field.vector || !matches!(field.ty, FieldType::Int(_) | FieldType::Enum(_)) {
            return Err(self.misuse(
                format!("an integer/enum field (for {op})"),
                format!("field {name:?} is {:?}", field.ty),
            ));
        }
        let width = field.slot_size(self.schema) as usize;
        let bytes = (value as u64).to_le_bytes();
        let pos = self.slot_pos(start, def, idx);
        self.buf[pos..pos + width].copy_from_slice(&bytes[..width]);
        self.mark_present(start, idx);
        Ok(())
    }

    /// Set an integer- or enum-typed scalar field. `value` is
    /// sign/zero-extended to `i64` by the caller (generated code knows
    /// the field's declared width); only the low `width` bytes of its
    /// little-endian form are written, so this is correct for signed
    /// and unsigned fields alike.
    pub fn set_int(&mut self, field: &str, value: i64) -> Result<()> {
        self.set_int_impl(field, value, "set_int")
    }

    pub fn set_enum(&mut self, field: &str, value: i64) -> Result<()> {
        self.set_int_impl(field, value, "set_enum")
    }

    pub fn set_f32(&mut self, field: &str, value: f32) -> Result<()> {
        self.check_poison()?;
        let (def, start) = self.table_scope("set_f32")?;
        let (idx, f) = self.field(def, field, "set_f32")?;
        if f.vector || !matches!(f.ty, FieldType::F32) {
            return Err(self.misuse("an f32 field", format!("field {field:?} is {:?}", f.ty)));
        }
        let pos = self.slot_pos(start, def, idx);
        self.buf[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
        self.mark_present(start, idx);
        Ok(())
    }

    pub fn set_f64(&mut self, field: &str, value: f64) -> Result<()> {
        self.check_poison()?;
        let (def, start) = self.table_scope("set_f64")?;
        let (idx, f) = self.field(def, field, "set_f64")?;
        if f.vector || !matches!(f.ty, FieldType::F64) {
            return Err(self.misuse("an f64 field", format!("field {field:?} is {:?}", f.ty)));
        }
        let pos = self.slot_pos(start, def, idx);
        self.buf[pos..pos + 8].copy_from_slice(&value.to_le_bytes());
        self.mark_present(start, idx);
        Ok(())
    }

    // ---- string / table / vector fields (offset slots) ----

    fn set_offset_field(&mut self, field: &str, offset: u64, op: &str, want_table: bool) -> Result<()> {
        self.check_poison()?;
        let (def, start) = self.table_scope(op)?;
        let (idx, f) = self.field(def, field, op)?;
        let ok = if want_table {
            !f.vector && matches!(f.ty, FieldType::Table(_))
        } else if op == "set_string" {
            !f.vector && matches!(f.ty, FieldType::Str)
        } else {
            f.vector
        };
        if !ok {
            return Err(self.misuse(
                format!("a field compatible with {op}"),
                format!("field {field:?} is {:?} (vector={})", f.ty, f.vector),
            ));
        }
        let pos = self.slot_pos(start, def, idx);
        self.buf[pos..pos + OFFSET_SIZE].copy_from_slice(&offset.to_le_bytes());
        self.mark_present(start, idx);
        Ok(())
    }

    /// Write a string's bytes at the current end of the buffer, and
    /// bind its offset into `field`.
    pub fn set_string(&mut self, field: &str, s: &str) -> Result<()> {
        let offset = self.create_string(s)?;
        self.set_offset_field(field, offset, "set_string", false)
    }

    /// Bind a nested table's already-resolved offset (from `end_table`)
    /// into `field`.
    pub fn set_table(&mut self, field: &str, offset: u64) -> Result<()> {
        self.set_offset_field(field, offset, "set_table", true)
    }

    /// Bind a vector's already-resolved offset (from `end_vector` or
    /// `create_scalar_vector`) into `field`, regardless of the
    /// vector's element kind (every vector slot is an 8-byte offset).
    pub fn set_vector(&mut self, field: &str, offset: u64) -> Result<()> {
        self.set_offset_field(field, offset, "set_vector", false)
    }

    /// Append a standalone string (len-prefixed bytes) at the current
    /// end of the buffer and return its absolute offset. Used both for
    /// `set_string` and for pushing an element into a string vector.
    pub fn create_string(&mut self, s: &str) -> Result<u64> {
        self.check_poison()?;
        let offset = self.checked_offset()?;
        wire::write_u64_le(&mut self.buf, s.len() as u64);
        self.buf.extend_from_slice(s.as_bytes());
        Ok(offset)
    }

    fn checked_offset(&mut self) -> Result<u64> {
        u64::try_from(self.buf.len()).map_err(|_| self.fail(Error::OffsetOverflow))
    }

    // ---- vector scopes ----

    pub fn start_scalar_vector(&mut self, elem_width: u8) -> Result<()> {
        self.check_poison()?;
        self.stack.push(Scope::Vector {
            kind: VectorKind::Scalar(elem_width),
            start: self.buf.len(),
            count: 0,
            data: Vec::new(),
        });
        Ok(())
    }

    pub fn start_string_vector(&mut self) -> Result<()> {
        self.check_poison()?;
        self.stack.push(Scope::Vector {
            kind: VectorKind::StringOffsets,
            start: self.buf.len(),
            count: 0,
            data: Vec::new(),
        });
        Ok(())
    }

    pub fn start_table_vector(&mut self) -> Result<()> {
        self.check_poison()?;
        self.stack.push(Scope::Vector {
            kind: VectorKind::TableOffsets,
            start: self.buf.len(),
            count: 0,
            data: Vec::new(),
        });
        Ok(())
    }

    fn vector_scope(&mut self, want: Option<VectorKind>, op: &str) -> Result<&mut Scope<'s>> {
        match self.stack.last() {
            Some(Scope::Vector { kind, .. }) => {
                if let Some(want) = want {
                    let matches = match (want, *kind) {
                        (VectorKind::Scalar(_), VectorKind::Scalar(_)) => true,
                        (a, b) => a == b,
                    };
                    if !matches {
                        let actual = kind.name().to_string();
                        return Err(self.misuse(format!("a {} (for {op})", want.name()), actual));
                    }
                }
            }
            Some(Scope::Table { .. }) => {
                return Err(self.misuse(format!("a vector (for {op})"), "top of stack is a table"))
            }
            None => return Err(self.misuse(format!("a vector (for {op})"), "no open scope")),
        }
        Ok(self.stack.last_mut().unwrap())
    }

    fn push_scalar_bytes(&mut self, bytes: &[u8], op: &str) -> Result<()> {
        self.check_poison()?;
        let width = bytes.len() as u8;
        let scope = self.vector_scope(Some(VectorKind::Scalar(width)), op)?;
        if let Scope::Vector { kind, count, data, .. } = scope {
            let expected = match kind {
                VectorKind::Scalar(w) => *w,
                _ => unreachable!(),
            };
            if expected != width {
                return Err(self.misuse(
                    format!("a scalar vector of width {expected}"),
                    format!("push of width {width}"),
                ));
            }
            data.extend_from_slice(bytes);
            *count += 1;
            Ok(())
        } else {
            unreachable!()
        }
    }

    pub fn push_int(&mut self, width: u8, value: i64) -> Result<()> {
        let bytes = (value as u64).to_le_bytes();
        self.push_scalar_bytes(&bytes[..width as usize], "push_int")
    }

    pub fn push_enum(&mut self, width: u8, value: i64) -> Result<()> {
        self.push_int(width, value)
    }

    pub fn push_f32(&mut self, value: f32) -> Result<()> {
        self.push_scalar_bytes(&value.to_le_bytes(), "push_f32")
    }

    pub fn push_f64(&mut self, value: f64) -> Result<()> {
        self.push_scalar_bytes(&value.to_le_bytes(), "push_f64")
    }

    pub fn push_string(&mut self, s: &str) -> Result<()> {
        let offset = self.create_string(s)?;
        let scope = self.vector_scope(Some(VectorKind::StringOffsets), "push_string")?;
        if let Scope::Vector { count, data, .. } = scope {
            data.extend_from_slice(&offset.to_le_bytes());
            *count += 1;
            Ok(())
        } else {
            unreachable!()
        }
    }

    /// Push a table element's already-resolved offset (from
    /// `end_table`) into the table vector at the top of the stack.
    pub fn push_table(&mut self, offset: u64) -> Result<()> {
        let scope = self.vector_scope(Some(VectorKind::TableOffsets), "push_table")?;
        if let Scope::Vector { count, data, .. } = scope {
            data.extend_from_slice(&offset.to_le_bytes());
            *count += 1;
            Ok(())
        } else {
            unreachable!()
        }
    }

    /// End the vector at the top of the stack: writes its header and
    /// entries, contiguous, at the current end of the buffer, and
    /// returns that offset.
    pub fn end_vector(&mut self) -> Result<u64> {
        self.check_poison()?;
        match self.stack.pop() {
            Some(Scope::Vector { kind, count, data, .. }) => self.flush_vector(kind, count, data),
            Some(other) => {
                self.stack.push(other);
                Err(self.misuse("a vector", "top of stack is a table"))
            }
            None => Err(self.misuse("a vector", "no open scope")),
        }
    }

    pub fn cancel_vector(&mut self) -> Result<()> {
        self.check_poison()?;
        match self.stack.pop() {
            Some(Scope::Vector { start, .. }) => {
                self.buf.truncate(start);
                Ok(())
            }
            Some(other) => {
                self.stack.push(other);
                Err(self.misuse("a vector", "top of stack is a table"))
            }
            None => Err(self.misuse("a vector", "no open scope")),
        }
    }

    fn flush_vector(&mut self, kind: VectorKind, count: u64, data: Vec<u8>) -> Result<u64> {
        let offset = self.checked_offset()?;
        wire::write_u64_le(&mut self.buf, count);
        if kind.has_length_field() {
            let length = data.len() as u64;
            wire::write_u64_le(&mut self.buf, length);
        }
        self.buf.extend_from_slice(&data);
        Ok(offset)
    }

    /// Bulk-build a scalar vector in one call (the `V_create` form),
    /// without going through `start`/`push`/`end`. Produces bytes
    /// identical to the push-based equivalent (spec invariant #7).
    pub fn create_scalar_vector_int(&mut self, width: u8, values: &[i64]) -> Result<u64> {
        self.check_poison()?;
        let len = values
            .len()
            .checked_mul(width as usize)
            .ok_or_else(|| self.fail(Error::VectorOverflow))?;
        let mut data = Vec::with_capacity(len);
        for &v in values {
            let bytes = (v as u64).to_le_bytes();
            data.extend_from_slice(&bytes[..width as usize]);
        }
        self.flush_vector(VectorKind::Scalar(width), values.len() as u64, data)
    }

    pub fn create_scalar_vector_f32(&mut self, values: &[f32]) -> Result<u64> {
        self.check_poison()?;
        let mut data = Vec::with_capacity(values.len() * 4);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        self.flush_vector(VectorKind::Scalar(4), values.len() as u64, data)
    }

    pub fn create_scalar_vector_f64(&mut self, values: &[f64]) -> Result<u64> {
        self.check_poison()?;
        let mut data = Vec::with_capacity(values.len() * 8);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        self.flush_vector(VectorKind::Scalar(8), values.len() as u64, data)
    }

    // ---- finish ----

    /// Verify the stack has returned to idle and the root table
    /// occupies bytes `[0, root_size)`, then return the finished
    /// buffer (spec §4.D "Linearization").
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        self.check_poison()?;
        if !self.stack.is_empty() {
            return Err(self.misuse("an idle encoder", "a scope is still open"));
        }
        if self.root_start != Some(0) {
            return Err(self.misuse("output_start to have been called", "no root table was started"));
        }
        self.root_start = None;
        Ok(std::mem::take(&mut self.buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldType, IntWidth, Schema, TableDef};

    fn all_scalars_schema() -> Schema {
        let t = TableDef {
            name: "T".into(),
            fields: vec![
                FieldDef { name: "a".into(), ty: FieldType::Int(IntWidth::I32), vector: false, default: None },
                FieldDef { name: "b".into(), ty: FieldType::Int(IntWidth::U64), vector: false, default: None },
                FieldDef { name: "c".into(), ty: FieldType::Int(IntWidth::I8), vector: false, default: None },
            ],
        };
        Schema::new(None, vec![], vec![t], "T").unwrap()
    }

    #[test]
    fn all_scalars_table_scenario() {
        let schema = all_scalars_schema();
        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.set_int("a", 1).unwrap();
        enc.set_int("b", 2).unwrap();
        enc.set_int("c", 3).unwrap();
        enc.end_table().unwrap();
        let buf = enc.finish().unwrap();

        assert_eq!(buf.len(), 14);
        assert_eq!(buf[0], 0b0000_0111);
        assert_eq!(&buf[1..5], &1i32.to_le_bytes());
        assert_eq!(&buf[5..13], &2u64.to_le_bytes());
        assert_eq!(buf[13], 3);
    }

    #[test]
    fn absent_field_leaves_slot_zeroed() {
        let schema = all_scalars_schema();
        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.set_int("a", 1).unwrap();
        enc.set_int("c", 3).unwrap();
        enc.end_table().unwrap();
        let buf = enc.finish().unwrap();

        assert_eq!(buf[0], 0b0000_0101);
        assert_eq!(&buf[5..13], &[0u8; 8]);
    }

    #[test]
    fn scalar_vector_scenario() {
        let field = FieldDef {
            name: "xs".into(),
            ty: FieldType::Int(IntWidth::U16),
            vector: true,
            default: None,
        };
        let t = TableDef { name: "Out".into(), fields: vec![field] };
        let schema = Schema::new(None, vec![], vec![t], "Out").unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.start_scalar_vector(2).unwrap();
        for v in [0x0102i64, 0x0304, 0x0506, 0x0708] {
            enc.push_int(2, v).unwrap();
        }
        let vec_off = enc.end_vector().unwrap();
        enc.set_vector("xs", vec_off).unwrap();
        enc.end_table().unwrap();
        let buf = enc.finish().unwrap();

        // table region: bitmap(1) + slot(8) = 9 bytes, then the vector.
        assert_eq!(vec_off, 9);
        let vec_bytes = &buf[9..];
        assert_eq!(&vec_bytes[0..8], &4u64.to_le_bytes());
        assert_eq!(&vec_bytes[8..16], &8u64.to_le_bytes());
        assert_eq!(&vec_bytes[16..24], &[0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07]);
    }

    #[test]
    fn string_scenario() {
        let field = FieldDef { name: "s".into(), ty: FieldType::Str, vector: false, default: None };
        let t = TableDef { name: "Out".into(), fields: vec![field] };
        let schema = Schema::new(None, vec![], vec![t], "Out").unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.set_string("s", "hi").unwrap();
        enc.end_table().unwrap();
        let buf = enc.finish().unwrap();

        let str_bytes = &buf[9..];
        assert_eq!(&str_bytes[0..8], &2u64.to_le_bytes());
        assert_eq!(&str_bytes[8..10], b"hi");
    }

    #[test]
    fn cancel_is_erasing() {
        let field = FieldDef { name: "s".into(), ty: FieldType::Str, vector: false, default: None };
        let inner = TableDef { name: "Inner".into(), fields: vec![] };
        let t = TableDef {
            name: "Out".into(),
            fields: vec![
                field,
                FieldDef { name: "child".into(), ty: FieldType::Table(0), vector: false, default: None },
            ],
        };
        let schema = Schema::new(None, vec![], vec![inner, t], "Out").unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.set_string("s", "hi").unwrap();
        enc.end_table().unwrap();
        let without_cancel = enc.finish().unwrap();

        let mut enc2 = Encoder::new(&schema);
        enc2.start_output().unwrap();
        enc2.set_string("s", "hi").unwrap();
        enc2.start_table("Inner").unwrap();
        enc2.cancel_table().unwrap();
        enc2.end_table().unwrap();
        let with_cancel = enc2.finish().unwrap();

        assert_eq!(without_cancel, with_cancel);
    }

    #[test]
    fn vector_of_tables_with_cancel_skips_odd_elements() {
        let inner = TableDef {
            name: "A".into(),
            fields: vec![FieldDef { name: "v".into(), ty: FieldType::Int(IntWidth::I32), vector: false, default: None }],
        };
        let outer = TableDef {
            name: "Out".into(),
            fields: vec![FieldDef { name: "tables".into(), ty: FieldType::Table(0), vector: true, default: None }],
        };
        let schema = Schema::new(None, vec![], vec![inner, outer], "Out").unwrap();

        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        enc.start_table_vector().unwrap();
        for i in 0..4 {
            enc.start_table("A").unwrap();
            enc.set_int("v", i).unwrap();
            if i % 2 == 1 {
                enc.cancel_table().unwrap();
            } else {
                let off = enc.end_table().unwrap();
                enc.push_table(off).unwrap();
            }
        }
        let vec_off = enc.end_vector().unwrap();
        enc.set_vector("tables", vec_off).unwrap();
        enc.end_table().unwrap();
        let buf = enc.finish().unwrap();

        let count = u64::from_le_bytes(buf[vec_off as usize..vec_off as usize + 8].try_into().unwrap());
        assert_eq!(count, 2);
    }

    #[test]
    fn encoder_misuse_poisons_session() {
        let schema = all_scalars_schema();
        let mut enc = Encoder::new(&schema);
        enc.start_output().unwrap();
        let err1 = enc.set_int("nope", 1).unwrap_err();
        let err2 = enc.set_int("a", 1).unwrap_err();
        assert_eq!(err1, err2);
    }

    #[test]
    fn bulk_create_matches_push_sequence() {
        let field = FieldDef { name: "xs".into(), ty: FieldType::Int(IntWidth::I32), vector: true, default: None };
        let t = TableDef { name: "Out".into(), fields: vec![field] };
        let schema = Schema::new(None, vec![], vec![t], "Out").unwrap();
        let values = [1i64, 2, 3, 4];

        let mut bulk = Encoder::new(&schema);
        bulk.start_output().unwrap();
        let off = bulk.create_scalar_vector_int(4, &values).unwrap();
        bulk.set_vector("xs", off).unwrap();
        bulk.end_table().unwrap();
        let bulk_buf = bulk.finish().unwrap();

        let mut pushed = Encoder::new(&schema);
        pushed.start_output().unwrap();
        pushed.start_scalar_vector(4).unwrap();
        for v in values {
            pushed.push_int(4, v).unwrap();
        }
        let off = pushed.end_vector().unwrap();
        pushed.set_vector("xs", off).unwrap();
        pushed.end_table().unwrap();
        let pushed_buf = pushed.finish().unwrap();

        assert_eq!(bulk_buf, pushed_buf);
    }
}
