//! The Schema Model (§4.A): a typed, validated, post-parse-immutable
//! representation of a schema's enums, tables and output. Constructed
//! by [`crate::schema::parser`], queried by the encoder/decoder and by
//! the code emitters.

pub mod parser;

use crate::error::{ensure_schema, schema_invalid, Error, Result};
use std::collections::HashSet;

/// Integer base type of an enum, or of an integer-typed field.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntWidth {
    pub fn bytes(self) -> u8 {
        match self {
            IntWidth::I8 | IntWidth::U8 => 1,
            IntWidth::I16 | IntWidth::U16 => 2,
            IntWidth::I32 | IntWidth::U32 => 4,
            IntWidth::I64 | IntWidth::U64 => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, IntWidth::I8 | IntWidth::I16 | IntWidth::I32 | IntWidth::I64)
    }

    /// Whether `value` fits in this width (signed range for signed
    /// widths, unsigned range for unsigned widths).
    pub fn fits(self, value: i128) -> bool {
        match self {
            IntWidth::I8 => i8::try_from(value).is_ok(),
            IntWidth::I16 => i16::try_from(value).is_ok(),
            IntWidth::I32 => i32::try_from(value).is_ok(),
            IntWidth::I64 => i64::try_from(value).is_ok(),
            IntWidth::U8 => u8::try_from(value).is_ok(),
            IntWidth::U16 => u16::try_from(value).is_ok(),
            IntWidth::U32 => u32::try_from(value).is_ok(),
            IntWidth::U64 => u64::try_from(value).is_ok(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IntWidth::I8 => "i8",
            IntWidth::I16 => "i16",
            IntWidth::I32 => "i32",
            IntWidth::I64 => "i64",
            IntWidth::U8 => "u8",
            IntWidth::U16 => "u16",
            IntWidth::U32 => "u32",
            IntWidth::U64 => "u64",
        }
    }
}

/// The type of a single (non-vector) field slot. Vectors of any of
/// these are expressed by `FieldDef::vector`, never by nesting a
/// `FieldType` inside itself (spec §3: "no nested vectors as a direct
/// field type").
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum FieldType {
    Int(IntWidth),
    /// Supported per spec's open question: IEEE-754 little-endian, 4
    /// slot bytes.
    F32,
    /// IEEE-754 little-endian, 8 slot bytes.
    F64,
    Str,
    Enum(usize),
    Table(usize),
}

impl FieldType {
    /// Slot width in bytes, per §4.C's table.
    pub fn slot_size(&self, schema: &Schema) -> u8 {
        match self {
            FieldType::Int(w) => w.bytes(),
            FieldType::F32 => 4,
            FieldType::F64 => 8,
            FieldType::Str => 8,
            FieldType::Enum(idx) => schema.enums[*idx].base.bytes(),
            FieldType::Table(_) => 8,
        }
    }

    fn display_str(&self, schema: &Schema) -> String {
        match self {
            FieldType::Int(w) => w.name().to_string(),
            FieldType::F32 => "f32".to_string(),
            FieldType::F64 => "f64".to_string(),
            FieldType::Str => "string".to_string(),
            FieldType::Enum(idx) => schema.enums[*idx].name.clone(),
            FieldType::Table(idx) => schema.tables[*idx].name.clone(),
        }
    }
}

/// A scalar default value, parsed into the variant matching the
/// field's declared type. Only scalar (non-vector, non-string,
/// non-table) fields may carry a default (spec §3).
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ScalarDefault {
    Int(i128),
    F32(f32),
    F64(f64),
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub vector: bool,
    pub default: Option<ScalarDefault>,
}

impl FieldDef {
    /// Slot width in bytes: the element type's width for a scalar
    /// field, always 8 (an offset) for a vector field regardless of
    /// element type.
    pub fn slot_size(&self, schema: &Schema) -> u8 {
        if self.vector {
            8
        } else {
            self.ty.slot_size(schema)
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub base: IntWidth,
    pub members: Vec<(String, i128)>,
}

impl EnumDef {
    pub fn width(&self) -> u8 {
        self.base.bytes()
    }

    pub fn member_value(&self, name: &str) -> Option<i128> {
        self.members.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl TableDef {
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// `ceil(N/8)`, the size in bytes of the presence bitmap prefix.
    pub fn bitmap_len(&self) -> usize {
        (self.fields.len() + 7) / 8
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Byte offset of field `idx`'s slot, relative to the start of the
    /// payload region (i.e. *after* the bitmap).
    pub fn slot_offset(&self, idx: usize, schema: &Schema) -> usize {
        self.fields[..idx]
            .iter()
            .map(|f| f.slot_size(schema) as usize)
            .sum()
    }

    pub fn payload_len(&self, schema: &Schema) -> usize {
        self.fields.iter().map(|f| f.slot_size(schema) as usize).sum()
    }

    /// Total size of this table's fixed region: bitmap + payload.
    pub fn total_len(&self, schema: &Schema) -> usize {
        self.bitmap_len() + self.payload_len(schema)
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    namespace: Option<String>,
    pub(crate) enums: Vec<EnumDef>,
    pub(crate) tables: Vec<TableDef>,
    root: usize,
}

/// What a name resolves to within a schema.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TypeRef {
    Enum(usize),
    Table(usize),
}

impl Schema {
    /// Construct and validate a schema from parts produced by the
    /// parser (or assembled programmatically, e.g. by tests). Rejects
    /// duplicate names, unresolved type references, out-of-range enum
    /// values, and a missing/duplicate root.
    pub fn new(
        namespace: Option<String>,
        enums: Vec<EnumDef>,
        tables: Vec<TableDef>,
        root_name: &str,
    ) -> Result<Schema> {
        let mut seen = HashSet::new();
        for e in &enums {
            ensure_schema!(
                seen.insert(e.name.clone()),
                "duplicate enum name {:?}",
                e.name
            );
            let mut members = HashSet::new();
            for (name, value) in &e.members {
                ensure_schema!(
                    members.insert(name.clone()),
                    "duplicate member {:?} in enum {:?}",
                    name,
                    e.name
                );
                ensure_schema!(
                    e.base.fits(*value),
                    "value {} of member {:?} does not fit in base type {} of enum {:?}",
                    value,
                    name,
                    e.base.name(),
                    e.name
                );
            }
        }
        for t in &tables {
            ensure_schema!(
                seen.insert(t.name.clone()),
                "duplicate table name {:?} (or it collides with an enum name)",
                t.name
            );
            let mut fields = HashSet::new();
            for f in &t.fields {
                ensure_schema!(
                    fields.insert(f.name.clone()),
                    "duplicate field {:?} in table {:?}",
                    f.name,
                    t.name
                );
                match &f.ty {
                    FieldType::Enum(idx) => ensure_schema!(
                        *idx < enums.len(),
                        "field {:?} of table {:?} references an unresolved enum type",
                        f.name,
                        t.name
                    ),
                    FieldType::Table(idx) => ensure_schema!(
                        *idx < tables.len(),
                        "field {:?} of table {:?} references an unresolved table type",
                        f.name,
                        t.name
                    ),
                    _ => {}
                }
                if f.default.is_some() {
                    ensure_schema!(
                        !f.vector
                            && !matches!(f.ty, FieldType::Str | FieldType::Table(_)),
                        "field {:?} of table {:?} has a default, but only scalar fields may",
                        f.name,
                        t.name
                    );
                }
            }
        }
        let root = tables
            .iter()
            .position(|t| t.name == root_name)
            .ok_or_else(|| {
                schema_invalid!("root table {:?} is not defined in this schema", root_name)
            })?;
        Ok(Schema {
            namespace,
            enums,
            tables,
            root,
        })
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Override the namespace for emission. The only mutation allowed
    /// after validation (spec §4.A).
    pub fn set_namespace(&mut self, namespace: impl Into<String>) {
        self.namespace = Some(namespace.into());
    }

    pub fn enums(&self) -> &[EnumDef] {
        &self.enums
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn root(&self) -> &TableDef {
        &self.tables[self.root]
    }

    pub fn root_index(&self) -> usize {
        self.root
    }

    pub fn table(&self, idx: usize) -> &TableDef {
        &self.tables[idx]
    }

    pub fn enum_def(&self, idx: usize) -> &EnumDef {
        &self.enums[idx]
    }

    pub fn table_index(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name == name)
    }

    pub fn enum_index(&self, name: &str) -> Option<usize> {
        self.enums.iter().position(|e| e.name == name)
    }

    pub fn field_type_name(&self, ty: &FieldType) -> String {
        ty.display_str(self)
    }
}
