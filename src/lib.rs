// ABOUTME: Binary object-graph serializer with shared-reference tracking and generic type resolution.
// ABOUTME: Provides the Engine entry points plus one-shot helpers for encoding and decoding graphs.

//! # graphcodec
//!
//! A binary serializer for object graphs: class instances, lists and maps
//! that may share sub-objects and form cycles.
//!
//! Every identity-bearing value (list, map or class instance) is written once;
//! later occurrences in the same call become back-references, so the decoded
//! graph has the same sharing and cycles as the original. Generic classes are
//! resolved against their declared type arguments, so values of a resolved
//! type parameter are written without a runtime type tag.
//!
//! ## Quick Start
//!
//! ```rust
//! use graphcodec::{ClassShape, Engine, Registry, Type, Value};
//! use std::sync::Arc;
//!
//! let mut registry = Registry::new();
//! let node = registry
//!     .register(
//!         ClassShape::new("Node")
//!             .required_field("id", Type::Int)
//!             .field("next", Type::Any),
//!     )
//!     .unwrap();
//! let mut engine = Engine::new(Arc::new(registry));
//!
//! // A node that points at itself
//! let a = Value::object(node, vec![Value::Int(1), Value::Null]);
//! a.set_field(1, a.clone());
//!
//! let bytes = engine.to_vec(&a, &Type::class(node)).unwrap();
//! let decoded = engine.read_object(&bytes, &Type::class(node)).unwrap();
//!
//! assert_eq!(decoded.field(0), Some(Value::Int(1)));
//! assert!(decoded.field(1).unwrap().same_instance(&decoded));
//! ```
//!
//! ## Generics
//!
//! ```rust
//! use graphcodec::{ClassShape, Engine, Registry, Type, Value};
//! use std::sync::Arc;
//!
//! let mut registry = Registry::new();
//! let boxed = registry
//!     .register(ClassShape::new("Box").param("T").field("value", Type::Var(0)))
//!     .unwrap();
//! let mut engine = Engine::new(Arc::new(registry));
//!
//! let value = Value::object(boxed, vec![Value::from("hello")]);
//! let tagged = engine.to_vec(&value, &Type::class(boxed)).unwrap();
//! let bound = engine
//!     .to_vec(&value, &Type::generic(boxed, vec![Type::Str]))
//!     .unwrap();
//!
//! // With `T = str` the field needs no runtime type tag
//! assert_eq!(tagged.len(), bound.len() + 1);
//! ```
//!
//! ## Resource Limits
//!
//! Default limits (see [`limits`]):
//! - Maximum nesting depth: 128
//! - Maximum container size: 1,000,000 elements
//! - Maximum string length: 10 MB
//! - Repeated generic bindings checked over the last 2 frames

pub mod codec;
pub mod engine;
pub mod error;
pub mod fields;
pub mod generics;
pub mod input;
pub mod output;
pub mod references;
pub mod registry;
pub mod types;
pub mod value;

// Re-export commonly used items at the crate root
pub use codec::ValueCodec;
pub use engine::{Engine, EngineConfig, ReadContext, WriteContext};
pub use error::{Error, Result};
pub use fields::FieldSerializer;
pub use generics::{Binding, GenericsResolver, Scope, TypeBinding, TypeBindingStack};
pub use input::{Input, ReadLimits};
pub use output::Output;
pub use references::{RefId, ReferenceTable};
pub use registry::{ClassShape, FieldSlot, Registry};
pub use types::{limits, marker, tag, ClassId, Type, TypeKey};
pub use value::{Instance, ListRef, MapRef, ObjectRef, Value};

use std::io::Write;
use std::sync::Arc;

/// Encode a graph with a default-configured engine.
///
/// # Example
///
/// ```rust
/// use graphcodec::{to_vec, Registry, Type, Value};
/// use std::sync::Arc;
///
/// let registry = Arc::new(Registry::new());
/// let bytes = to_vec(&registry, &Value::Int(-2), &Type::Int).unwrap();
/// assert_eq!(bytes, vec![0x02, 0x06]); // NEW marker, zigzag(-2)
/// ```
pub fn to_vec(registry: &Arc<Registry>, value: &Value, ty: &Type) -> Result<Vec<u8>> {
    Engine::new(Arc::clone(registry)).to_vec(value, ty)
}

/// Encode a graph to a writer with a default-configured engine.
///
/// Returns the number of bytes written.
pub fn to_writer<W: Write>(
    registry: &Arc<Registry>,
    writer: &mut W,
    value: &Value,
    ty: &Type,
) -> Result<usize> {
    Engine::new(Arc::clone(registry)).write_object(writer, value, ty)
}

/// Decode a complete document with a default-configured engine.
///
/// # Example
///
/// ```rust
/// use graphcodec::{from_slice, Registry, Type, Value};
/// use std::sync::Arc;
///
/// let registry = Arc::new(Registry::new());
/// let value = from_slice(&registry, &[0x02, 0x06], &Type::Int).unwrap();
/// assert_eq!(value, Value::Int(-2));
/// ```
pub fn from_slice(registry: &Arc<Registry>, data: &[u8], ty: &Type) -> Result<Value> {
    Engine::new(Arc::clone(registry)).read_object(data, ty)
}
