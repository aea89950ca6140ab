//! # netser
//!
//! A compact, registry-bound binary serializer for object graphs.
//!
//! - Value types are registered up front; each gets a dense numeric id from its registration order
//! - Objects are written with their *runtime* type id, so a field declared as a base type can carry a derived value
//! - Inherited fields (via `#[netser(extends)]`) are written ancestor-first, then the type's own fields
//! - Primitives, nullable boxed primitives, text, sequences, sets, maps, type literals and nested objects
//! - Collections use a self-describing tag optimization for small integers and repeated strings
//! - Decoding bypasses ordinary constructors: instances are bare-allocated and fields installed directly
//!
//! ## Attribute Macros
//!
//! `#[derive(Serializable)]` accepts the following field attributes:
//!
//! - `#[netser(extends)]`: The field embeds the ancestor value type. Its fields are serialized first.
//! - `#[netser(immutable)]`: Constructor-only field. Serialized normally; the decoder installs it directly.
//! - `#[netser(constant = "abc")]`: Compile-time constant. Never written; restored by bare allocation.
//! - `#[netser(skip)]`: Excluded from serialization. Restored to `Default::default()`.
//! - `#[netser(rename = "name")]`: Logical field name used in the descriptor and layout hash.
//!
//! ## Feature Flags
//!
//! - `indexmap`: Enables `IndexMap` and `IndexSet`.
//! - `fxhash`: Enables `fxhash::FxHashMap` and `fxhash::FxHashSet`.
//! - `ahash`: Enables `ahash::AHashMap` and `ahash::AHashSet`.
//! - `smol_str`: Enables `smol_str::SmolStr` as text.
//!
//! ## Example
//!
//! ```rust
//! use netser::{SerDes, Serializable};
//!
//! #[derive(Serializable, Debug, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! let serdes = SerDes::builder().register::<Point>().build().unwrap();
//! let bytes = serdes.encode(&Point { x: 3, y: -4 }).unwrap();
//! let decoded: Point = serdes.decode(&bytes).unwrap();
//! assert_eq!(decoded, Point { x: 3, y: -4 });
//! ```

extern crate self as netser;

pub mod collection;
pub mod context;
pub mod core;
mod features;
pub mod model;
pub mod object;
pub mod registry;
pub mod serdes;
pub mod types;
pub mod value;

pub use crate::collection::ElementTable;
pub use crate::context::{ReadContext, WriteContext};
pub use crate::core::*;
pub use crate::model::{
    FieldAccess, FieldDescriptor, FieldModel, FieldSlot, Mutability, Object, ParentLink,
    PrimitiveKind, ReadFn, Serializable, TypeDescriptor, TypeLayout, ValueKind, WriteFn,
};
pub use crate::object::Poly;
pub use crate::registry::TypeRegistry;
pub use crate::serdes::{Config, Schema, SerDes, SerDesBuilder};
pub use crate::types::{BuiltinType, NameTable, TypeKey, TypeRef, TypeResolver};
pub use crate::value::Value;
pub use netser_derive::Serializable;

/// Errors that can occur while building a registry, encoding or decoding.
#[derive(Debug, thiserror::Error)]
pub enum SerDesError {
    /// The value's runtime type is not registered and is not a built-in kind.
    #[error("Type {type_name} is not registered")]
    UnregisteredType { type_name: &'static str },
    /// The same type was registered twice.
    #[error("Type {type_name} is registered more than once")]
    DuplicateType { type_name: &'static str },
    /// A declared field cannot be mapped to an encodable kind.
    #[error("Field '{field}' of {type_name} is not supported: {reason}")]
    UnsupportedField {
        type_name: &'static str,
        field: &'static str,
        reason: String,
    },
    /// A type identifier or tag byte outside every known range.
    #[error("Unknown type id: {0}")]
    UnknownTypeId(u64),
    /// The source ended in the middle of a value.
    #[error("Stream truncated in the middle of a value")]
    TruncatedStream,
    /// The decoded kind disagrees with the kind expected at this position.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    /// The encoder reached an object that is already being written.
    #[error("Cyclic object graph detected at {type_name}")]
    CyclicGraphUnsupported { type_name: &'static str },
    /// A named type literal could not be resolved.
    #[error("Type name '{0}' could not be resolved")]
    NameNotFound(String),
    /// Nesting exceeded the configured depth limit.
    #[error("Nesting depth exceeds the limit of {limit}")]
    DepthLimitExceeded { limit: usize },
    /// Structurally invalid payload (bad UTF-8, bad char, undefined table reference, ...).
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// I/O failure of the sink or source, passed through unchanged.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SerDesError {
    pub(crate) fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        SerDesError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, SerDesError>;

/// Trait for types that can be written in the netser binary format.
///
/// Implemented for primitives, `String`, `Option<T>`, std collections, [`Value`], [`TypeRef`],
/// `Box<dyn Object>`, [`Poly`] and every `#[derive(Serializable)]` type.
pub trait Encoder {
    /// Write the value, starting with its type tag.
    fn encode(&self, ctx: &mut WriteContext<'_>) -> Result<()>;

    /// Write the value as an element of a collection or map.
    ///
    /// Types that take part in the tag optimization override this; everything else
    /// goes through [`Encoder::encode`].
    fn encode_element(&self, ctx: &mut WriteContext<'_>, table: &mut ElementTable) -> Result<()> {
        let _ = table;
        self.encode(ctx)
    }

    /// The value kind a field of this type has in the field model.
    fn kind() -> ValueKind
    where
        Self: Sized;
}

/// Trait for types that can be read back from the netser binary format.
pub trait Decoder: Sized {
    /// Read a tag and the value that follows it.
    fn decode(ctx: &mut ReadContext<'_>) -> Result<Self> {
        let tag = ctx.read_u8()?;
        Self::decode_tagged(tag, ctx)
    }

    /// Read the value whose tag has already been consumed.
    fn decode_tagged(tag: u8, ctx: &mut ReadContext<'_>) -> Result<Self>;

    /// Read a collection element whose tag has already been consumed.
    fn decode_element(tag: u8, ctx: &mut ReadContext<'_>, table: &mut ElementTable) -> Result<Self> {
        let _ = table;
        Self::decode_tagged(tag, ctx)
    }
}
