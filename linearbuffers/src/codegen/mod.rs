//! Code Emitters (§4.F): mechanical translation from the Schema Model
//! into target-language source. Each emitter only consumes facts
//! exposed by [`crate::schema::Schema`] (field names, types, vector
//! flags, enum members, slot widths) — none of them hardcode wire
//! layout knowledge that isn't already derivable from the schema, so a
//! new target language is only a new `Emitter` impl away.

pub mod c;
pub mod js;

use crate::schema::Schema;
use std::fmt::Write as _;

/// A target language's code generator. `emit_encoder`/`emit_decoder`
/// accept the same `--encoder-include-library`/`--decoder-use-memcpy`
/// knobs the CLI exposes (§9); they affect only the emitted source,
/// never this crate's own runtime.
pub trait Emitter {
    /// Human-readable rendering of the schema, for `--pretty` (§4.F
    /// "Pretty printer").
    fn emit_pretty(&self, schema: &Schema) -> String;

    /// Encoder-side bindings: one typed builder function per table
    /// field, calling into this target's runtime support.
    fn emit_encoder(&self, schema: &Schema, include_library: bool) -> String;

    /// Decoder-side bindings: one typed accessor per table field.
    fn emit_decoder(&self, schema: &Schema, use_memcpy: bool) -> String;

    /// A `to_json`-style printer walking a decoded value and writing
    /// it to the target language's idiomatic output sink.
    fn emit_jsonify(&self, schema: &Schema) -> String;
}

/// Shared name-mangling: `namespace_TableName_field` in snake_case,
/// the convention both the C and JS emitters build their symbol names
/// from (§8).
pub(crate) fn prefix(schema: &Schema) -> String {
    match schema.namespace() {
        Some(ns) if !ns.is_empty() => format!("{ns}_"),
        _ => String::new(),
    }
}

pub(crate) fn snake(name: &str) -> String {
    let mut out = String::new();
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Append a line, with `indent` levels of four spaces, to `out`.
pub(crate) fn line(out: &mut String, indent: usize, text: impl AsRef<str>) {
    for _ in 0..indent {
        out.push_str("    ");
    }
    out.push_str(text.as_ref());
    out.push('\n');
}

pub(crate) fn write_line(out: &mut String, indent: usize, args: std::fmt::Arguments<'_>) {
    let mut s = String::new();
    let _ = s.write_fmt(args);
    line(out, indent, s);
}

macro_rules! wline {
    ($out:expr, $indent:expr, $($arg:tt)*) => {
        $crate::codegen::write_line($out, $indent, format_args!($($arg)*))
    };
}
pub(crate) use wline;
