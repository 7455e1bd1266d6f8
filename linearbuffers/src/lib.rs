//! linearbuffers: a schema-driven, zero-copy binary serialization
//! toolchain. This crate provides the schema model and parser, the
//! normative wire format, the encoder and decoder runtimes, and the
//! target-language code emitters; `linearbuffers-cli` wraps them in a
//! command-line driver.

pub mod codegen;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod logging;
pub mod schema;
pub mod wire;

pub use error::{Error, Result};
pub use schema::Schema;
