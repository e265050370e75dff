// ABOUTME: Declared types, dispatch keys and wire constants for the graph codec.
// ABOUTME: Wire markers and type tags map directly to the encoded byte stream.

use crate::error::{Error, Result};
use std::fmt;

/// Index of a registered class in a [`Registry`](crate::Registry).
pub type ClassId = u32;

/// A declared type, as written on a field or passed to a top-level call.
///
/// Types are either concrete (`Int`, `List(..)`, `Class(..)`), a reference to
/// one of the enclosing class's generic parameters (`Var`), or unconstrained
/// (`Any`, `Wildcard`). Values whose type is not concrete at the point they
/// are written carry a runtime type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Unconstrained: the runtime type is tagged in the stream.
    Any,
    Bool,
    Int,
    Float,
    Str,
    /// A list with the given element type.
    List(Box<Type>),
    /// A string-keyed map with the given value type.
    Map(Box<Type>),
    /// A registered class with its type arguments. Missing arguments are unbound.
    Class(ClassId, Vec<Type>),
    /// The enclosing class's generic parameter with this index.
    Var(usize),
    /// An unbound type argument (`Container<?>`).
    Wildcard,
}

impl Type {
    /// A list of `elem`.
    #[must_use]
    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    /// A string-keyed map with values of type `value`.
    #[must_use]
    pub fn map(value: Type) -> Self {
        Type::Map(Box::new(value))
    }

    /// A class used without type arguments.
    #[must_use]
    pub fn class(id: ClassId) -> Self {
        Type::Class(id, Vec::new())
    }

    /// A class parameterized with `args`.
    #[must_use]
    pub fn generic(id: ClassId, args: Vec<Type>) -> Self {
        Type::Class(id, args)
    }

    /// The dispatch key if this type is concrete.
    #[must_use]
    pub fn key(&self) -> Option<TypeKey> {
        match self {
            Type::Bool => Some(TypeKey::Bool),
            Type::Int => Some(TypeKey::Int),
            Type::Float => Some(TypeKey::Float),
            Type::Str => Some(TypeKey::Str),
            Type::List(_) => Some(TypeKey::List),
            Type::Map(_) => Some(TypeKey::Map),
            Type::Class(id, _) => Some(TypeKey::Class(*id)),
            Type::Any | Type::Var(_) | Type::Wildcard => None,
        }
    }

    /// Returns true if this type or any nested argument is a type variable.
    #[must_use]
    pub fn has_vars(&self) -> bool {
        match self {
            Type::Var(_) => true,
            Type::List(inner) | Type::Map(inner) => inner.has_vars(),
            Type::Class(_, args) => args.iter().any(Type::has_vars),
            _ => false,
        }
    }

    /// The highest type-variable index referenced by this type, if any.
    #[must_use]
    pub fn max_var(&self) -> Option<usize> {
        match self {
            Type::Var(i) => Some(*i),
            Type::List(inner) | Type::Map(inner) => inner.max_var(),
            Type::Class(_, args) => args.iter().filter_map(Type::max_var).max(),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Str => write!(f, "str"),
            Type::List(elem) => write!(f, "list<{elem}>"),
            Type::Map(value) => write!(f, "map<str, {value}>"),
            Type::Class(id, args) if args.is_empty() => write!(f, "class#{id}"),
            Type::Class(id, args) => {
                write!(f, "class#{id}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
            Type::Var(i) => write!(f, "T{i}"),
            Type::Wildcard => write!(f, "?"),
        }
    }
}

/// The key a value codec is dispatched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeKey {
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    Class(ClassId),
}

impl TypeKey {
    /// The runtime type tag written for this key.
    #[must_use]
    pub const fn tag(self) -> u64 {
        match self {
            TypeKey::Bool => tag::BOOL,
            TypeKey::Int => tag::INT,
            TypeKey::Float => tag::FLOAT,
            TypeKey::Str => tag::STR,
            TypeKey::List => tag::LIST,
            TypeKey::Map => tag::MAP,
            TypeKey::Class(id) => tag::CLASS_BASE + id as u64,
        }
    }

    /// Parse a runtime type tag.
    pub fn from_tag(value: u64) -> Result<Self> {
        match value {
            tag::BOOL => Ok(TypeKey::Bool),
            tag::INT => Ok(TypeKey::Int),
            tag::FLOAT => Ok(TypeKey::Float),
            tag::STR => Ok(TypeKey::Str),
            tag::LIST => Ok(TypeKey::List),
            tag::MAP => Ok(TypeKey::Map),
            n => ClassId::try_from(n - tag::CLASS_BASE)
                .map(TypeKey::Class)
                .map_err(|_| Error::InvalidTypeTag(n)),
        }
    }

    /// Returns true for heap values whose identity can be shared (lists, maps, instances).
    #[inline]
    #[must_use]
    pub const fn is_identity(self) -> bool {
        matches!(self, TypeKey::List | TypeKey::Map | TypeKey::Class(_))
    }

    /// The type used when only the runtime kind is known.
    ///
    /// Element types and class arguments are left unconstrained.
    #[must_use]
    pub fn erased(self) -> Type {
        match self {
            TypeKey::Bool => Type::Bool,
            TypeKey::Int => Type::Int,
            TypeKey::Float => Type::Float,
            TypeKey::Str => Type::Str,
            TypeKey::List => Type::list(Type::Any),
            TypeKey::Map => Type::map(Type::Any),
            TypeKey::Class(id) => Type::class(id),
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::Bool => write!(f, "bool"),
            TypeKey::Int => write!(f, "int"),
            TypeKey::Float => write!(f, "float"),
            TypeKey::Str => write!(f, "str"),
            TypeKey::List => write!(f, "list"),
            TypeKey::Map => write!(f, "map"),
            TypeKey::Class(id) => write!(f, "class#{id}"),
        }
    }
}

/// Slot markers. Every tracked or nullable slot starts with one of these.
pub mod marker {
    /// The slot is null.
    pub const NULL: u64 = 0;
    /// A new value follows.
    pub const NEW: u64 = 1;
    /// `REF_BASE + id` is a back-reference to reference id `id`.
    pub const REF_BASE: u64 = 2;
}

/// Runtime type tags, written after a `NEW` marker when the slot type is not concrete.
pub mod tag {
    pub const BOOL: u64 = 0;
    pub const INT: u64 = 1;
    pub const FLOAT: u64 = 2;
    pub const STR: u64 = 3;
    pub const LIST: u64 = 4;
    pub const MAP: u64 = 5;
    /// `CLASS_BASE + id` names a registered class.
    pub const CLASS_BASE: u64 = 6;
}

/// Default resource limits.
pub mod limits {
    /// Maximum graph nesting depth
    pub const MAX_DEPTH: usize = 128;

    /// How many recent binding frames are checked for a repeated class parameter
    pub const MAX_GENERICS_DEPTH: usize = 2;

    /// Maximum elements in a single list or map
    pub const MAX_CONTAINER_SIZE: usize = 1_000_000;

    /// Maximum string length in bytes
    pub const MAX_STRING_LENGTH: usize = 10_000_000;

    /// Initial output buffer capacity in bytes
    pub const OUTPUT_CAPACITY: usize = 4096;
}
