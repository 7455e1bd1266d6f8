//! The Decoder Runtime (§4.E): zero-copy, borrowed views over a
//! buffer the caller owns. Every accessor walks absolute offsets
//! directly; there is no intermediate materialized tree. `TableView`
//! and `VectorView` mirror the field/element model the encoder writes,
//! so they can only be driven by generated code (or tests) that
//! already knows the schema's field names and element kinds — this
//! runtime does not re-derive them from the bytes.
//!
//! Every read is bounds-checked and returns `Error::DecodeCorrupt`
//! rather than panicking on a truncated or adversarial buffer; this is
//! the "hardened" mode of §4.E. `decoder_use_memcpy` (§4.F/§9) is a
//! code-generation knob for the emitted C/JS decoders only — it has no
//! bearing on this runtime, since `from_le_bytes` reads here are
//! already alignment-agnostic.

use crate::error::{Error, Result};
use crate::schema::{FieldType, IntWidth, Schema, TableDef};
use crate::wire::{self, OFFSET_SIZE};

fn corrupt(reason: impl Into<String>) -> Error {
    Error::DecodeCorrupt {
        reason: reason.into(),
    }
}

fn slice<'b>(buf: &'b [u8], pos: usize, len: usize) -> Result<&'b [u8]> {
    let end = pos
        .checked_add(len)
        .ok_or_else(|| corrupt("offset + length overflowed"))?;
    buf.get(pos..end)
        .ok_or_else(|| corrupt(format!("read of {len} bytes at {pos} runs past end of buffer ({})", buf.len())))
}

fn read_offset(buf: &[u8], pos: usize) -> Result<u64> {
    let bytes = slice(buf, pos, OFFSET_SIZE)?;
    Ok(u64::from_le_bytes(bytes.try_into().unwrap()))
}

fn sign_extend(bytes: &[u8], width: IntWidth) -> i64 {
    let mut buf8 = [0u8; 8];
    buf8[..bytes.len()].copy_from_slice(bytes);
    let raw = u64::from_le_bytes(buf8);
    if !width.is_signed() {
        return raw as i64;
    }
    match width {
        IntWidth::I8 => i8::from_le_bytes([bytes[0]]) as i64,
        IntWidth::I16 => i16::from_le_bytes(bytes.try_into().unwrap()) as i64,
        IntWidth::I32 => i32::from_le_bytes(bytes.try_into().unwrap()) as i64,
        IntWidth::I64 => i64::from_le_bytes(bytes.try_into().unwrap()),
        _ => unreachable!(),
    }
}

fn decode_str<'b>(buf: &'b [u8], pos: usize) -> Result<&'b str> {
    let len = read_offset(buf, pos)? as usize;
    let bytes = slice(buf, pos + OFFSET_SIZE, len)?;
    std::str::from_utf8(bytes).map_err(|e| corrupt(format!("string is not valid utf-8: {e}")))
}

/// A borrowed view of one table at a fixed absolute position.
#[derive(Clone, Copy)]
pub struct TableView<'s, 'b> {
    schema: &'s Schema,
    def: &'s TableDef,
    buf: &'b [u8],
    pos: usize,
}

impl<'s, 'b> TableView<'s, 'b> {
    /// View the root table at buffer offset 0.
    pub fn root(schema: &'s Schema, buf: &'b [u8]) -> Result<Self> {
        let def = schema.root();
        slice(buf, 0, def.total_len(schema))?;
        Ok(TableView { schema, def, buf, pos: 0 })
    }

    fn at(schema: &'s Schema, def: &'s TableDef, buf: &'b [u8], pos: usize) -> Result<Self> {
        slice(buf, pos, def.total_len(schema))?;
        Ok(TableView { schema, def, buf, pos })
    }

    fn field(&self, name: &str) -> Result<(usize, &'s crate::schema::FieldDef)> {
        let idx = self
            .def
            .field_index(name)
            .ok_or_else(|| corrupt(format!("unknown field {name:?} on table {:?}", self.def.name)))?;
        Ok((idx, &self.def.fields[idx]))
    }

    pub fn present(&self, name: &str) -> Result<bool> {
        let (idx, _) = self.field(name)?;
        let bitmap = slice(self.buf, self.pos, self.def.bitmap_len())?;
        Ok(wire::bit_get(bitmap, idx))
    }

    fn slot_pos(&self, idx: usize) -> usize {
        self.pos + self.def.bitmap_len() + self.def.slot_offset(idx, self.schema)
    }

    /// Read an `Int`- or `Enum`-typed scalar field, sign-extended to
    /// `i64`. Falls back to the field's declared default (or zero) if
    /// the field is absent.
    pub fn get_int(&self, name: &str) -> Result<i64> {
        let (idx, f) = self.field(name)?;
        let width = match &f.ty {
            FieldType::Int(w) => *w,
            FieldType::Enum(e) => self.schema.enum_def(*e).base,
            other => return Err(corrupt(format!("field {name:?} is {other:?}, not an integer"))),
        };
        if !self.present(name)? {
            return Ok(match f.default {
                Some(crate::schema::ScalarDefault::Int(v)) => v as i64,
                _ => 0,
            });
        }
        let pos = self.slot_pos(idx);
        let bytes = slice(self.buf, pos, width.bytes() as usize)?;
        Ok(sign_extend(bytes, width))
    }

    pub fn get_f32(&self, name: &str) -> Result<f32> {
        let (idx, f) = self.field(name)?;
        if !matches!(f.ty, FieldType::F32) {
            return Err(corrupt(format!("field {name:?} is not f32")));
        }
        if !self.present(name)? {
            return Ok(match f.default {
                Some(crate::schema::ScalarDefault::F32(v)) => v,
                _ => 0.0,
            });
        }
        let pos = self.slot_pos(idx);
        let bytes = slice(self.buf, pos, 4)?;
        Ok(f32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn get_f64(&self, name: &str) -> Result<f64> {
        let (idx, f) = self.field(name)?;
        if !matches!(f.ty, FieldType::F64) {
            return Err(corrupt(format!("field {name:?} is not f64")));
        }
        if !self.present(name)? {
            return Ok(match f.default {
                Some(crate::schema::ScalarDefault::F64(v)) => v,
                _ => 0.0,
            });
        }
        let pos = self.slot_pos(idx);
        let bytes = slice(self.buf, pos, 8)?;
        Ok(f64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn get_string(&self, name: &str) -> Result<Option<&'b str>> {
        let (idx, f) = self.field(name)?;
        if !matches!(f.ty, FieldType::Str) || f.vector {
            return Err(corrupt(format!("field {name:?} is not a scalar string")));
        }
        if !self.present(name)? {
            return Ok(None);
        }
        let offset = read_offset(self.buf, self.slot_pos(idx))?;
        Ok(Some(decode_str(self.buf, offset as usize)?))
    }

    pub fn get_table(&self, name: &str) -> Result<Option<TableView<'s, 'b>>> {
        let (idx, f) = self.field(name)?;
        let table_idx = match f.ty {
            FieldType::Table(t) if !f.vector => t,
            _ => return Err(corrupt(format!("field {name:?} is not a scalar table"))),
        };
        if !self.present(name)? {
            return Ok(None);
        }
        let offset = read_offset(self.buf, self.slot_pos(idx))?;
        let def = self.schema.table(table_idx);
        Ok(Some(TableView::at(self.schema, def, self.buf, offset as usize)?))
    }

    pub fn get_vector(&self, name: &str) -> Result<Option<VectorView<'s, 'b>>> {
        let (idx, f) = self.field(name)?;
        if !f.vector {
            return Err(corrupt(format!("field {name:?} is not a vector")));
        }
        if !self.present(name)? {
            return Ok(None);
        }
        let offset = read_offset(self.buf, self.slot_pos(idx))?;
        Ok(Some(VectorView::at(self.schema, self.buf, f.ty.clone(), offset as usize)?))
    }
}

/// A borrowed view of one vector at a fixed absolute position. The
/// caller must know the element kind (it comes from the field that
/// produced this view); wrong-kind accessors return `DecodeCorrupt`.
#[derive(Clone)]
pub struct VectorView<'s, 'b> {
    schema: &'s Schema,
    buf: &'b [u8],
    elem_ty: FieldType,
    count: u64,
    entries_pos: usize,
}

impl<'s, 'b> VectorView<'s, 'b> {
    fn has_length_field(elem_ty: &FieldType) -> bool {
        !matches!(elem_ty, FieldType::Table(_))
    }

    fn elem_width(&self, schema: &Schema) -> u8 {
        self.elem_ty.slot_size(schema)
    }

    fn at(schema: &'s Schema, buf: &'b [u8], elem_ty: FieldType, pos: usize) -> Result<Self> {
        let count = read_offset(buf, pos)?;
        let mut entries_pos = pos + OFFSET_SIZE;
        if Self::has_length_field(&elem_ty) {
            entries_pos += OFFSET_SIZE;
        }
        let width = elem_ty.slot_size(schema) as u64;
        let span = count
            .checked_mul(width)
            .ok_or_else(|| corrupt("vector length * element width overflowed"))?;
        slice(buf, entries_pos, span as usize)?;
        Ok(VectorView {
            schema,
            buf,
            elem_ty,
            count,
            entries_pos,
        })
    }

    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn entry_pos(&self, i: u64) -> Result<usize> {
        if i >= self.count {
            return Err(corrupt(format!("vector index {i} out of range (len {})", self.count)));
        }
        Ok(self.entries_pos + (i * self.elem_width(self.schema) as u64) as usize)
    }

    pub fn get_int(&self, i: u64) -> Result<i64> {
        let width = match &self.elem_ty {
            FieldType::Int(w) => *w,
            FieldType::Enum(e) => self.schema.enum_def(*e).base,
            other => return Err(corrupt(format!("vector element is {other:?}, not an integer"))),
        };
        let pos = self.entry_pos(i)?;
        let bytes = slice(self.buf, pos, width.bytes() as usize)?;
        Ok(sign_extend(bytes, width))
    }

    pub fn get_f32(&self, i: u64) -> Result<f32> {
        if !matches!(self.elem_ty, FieldType::F32) {
            return Err(corrupt("vector element is not f32"));
        }
        let pos = self.entry_pos(i)?;
        let bytes = slice(self.buf, pos, 4)?;
        Ok(f32::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn get_f64(&self, i: u64) -> Result<f64> {
        if !matches!(self.elem_ty, FieldType::F64) {
            return Err(corrupt("vector element is not f64"));
        }
        let pos = self.entry_pos(i)?;
        let bytes = slice(self.buf, pos, 8)?;
        Ok(f64::from_le_bytes(bytes.try_into().unwrap()))
    }

    pub fn get_string(&self, i: u64) -> Result<&'b str> {
        if !matches!(self.elem_ty, FieldType::Str) {
            return Err(corrupt("vector element is not a string"));
        }
        let pos = self.entry_pos(i)?;
        let offset = read_offset(self.buf, pos)?;
        decode_str(self.buf, offset as usize)
    }

    pub fn get_table(&self, i: u64) -> Result<TableView<'s, 'b>> {
        let table_idx = match self.elem_ty {
            FieldType::Table(t) => t,
            _ => return Err(corrupt("vector element is not a table")),
        };
        let pos = self.entry_pos(i)?;
        let offset = read_offset(self.buf, pos)?;
        let def = self.schema.table(table_idx);
        TableView::at(self.schema, def, self.buf, offset as usize)
    }
}
