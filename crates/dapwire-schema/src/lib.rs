//! Datatype declarations and the parameter engine for message payloads.
//!
//! The channel layer ships raw JSON. This crate declares what that JSON is
//! supposed to look like — per-request arguments, per-response and per-event
//! bodies — and turns a declaration into a runtime [`Parameter`] that can
//! test whether a raw value matches ([`Parameter::match_type`]), coerce it
//! into a typed value, validate semantic constraints beyond shape, and
//! serialize it back with round-trip fidelity.
//!
//! Declarations are built from a small vocabulary ([`Datatype`]): simple
//! kinds, enumerations, ordered unions (first match wins), arrays, mappings,
//! and named field-sets interned in a [`TypeTable`] so a type can refer to
//! itself ([`Datatype::SelfRef`]) without infinite recursion.

pub mod decl;
pub mod error;
pub mod namespace;
pub mod param;
pub mod registry;

pub use decl::{
    ComplexId, Datatype, EnumChoices, Field, FieldDecl, Fields, Scalar, Simple, TypeTable,
};
pub use error::{Result, SchemaError};
pub use namespace::{ArgValue, Namespace};
pub use param::{Bound, Handler, Parameter};
pub use registry::{MessageSchemas, MessageSchemasBuilder};
