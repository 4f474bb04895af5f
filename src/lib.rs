//! A declarative binary-framing library: record types are declared once
//! against a [`schema::SchemaBuilder`] (field names, order, codecs,
//! defaults, constants, variable-length relationships) and the resulting
//! [`schema::RecordSchema`] maps typed [`schema::RecordInstance`] values onto
//! fixed-byte-order octet streams and back.
//!
//! The hard core -- and the part of this crate with the deepest test
//! coverage -- is the schema/codec engine: [`codec`] (primitive and array
//! codecs), [`schema`] (record metadata, inheritance, parse/serialize/
//! size_of), [`length`] (the three ways a variable-width field's size is
//! determined) and [`dispatch`] (the discriminating parser that picks among
//! candidate record types by a leading constant prefix). [`value`] and
//! [`error`] are the supporting value/coercion and error/warning types, and
//! [`options`] holds the process-wide byte-order setting every encode/decode
//! reads.
//!
//! [`casing`], [`hexdump`], [`logging`] and [`server`] are thin ambient
//! collaborators around that core: a blocking TCP/UDP dispatch skeleton, a
//! five-stream logger facade, a hex-dump pretty printer, and the
//! name-casing helper the dispatch skeleton uses to pick a handler method.
//! None of them are called by the codec engine itself.
#![deny(missing_docs)]

pub mod casing;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod hexdump;
pub mod length;
pub mod logging;
pub mod options;
pub mod schema;
pub mod server;
pub mod value;

pub use codec::{ArraySpec, Codec, FieldOptions, Primitive, StringSpec};
pub use dispatch::{Namespace, Outcome};
pub use error::{Error, Result, Warning, Warnings};
pub use length::Length;
pub use options::{ByteOrder, EncErrors, Encoding};
pub use schema::{RecordInstance, RecordSchema, SchemaBuilder};
pub use value::Value;
