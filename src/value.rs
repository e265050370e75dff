// ABOUTME: Dynamic object-graph value type.
// ABOUTME: Lists, maps and class instances are shared handles whose identity the codec preserves.

use crate::types::{ClassId, TypeKey};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a list.
pub type ListRef = Rc<RefCell<Vec<Value>>>;

/// Shared handle to a string-keyed map.
pub type MapRef = Rc<RefCell<BTreeMap<String, Value>>>;

/// Shared handle to a class instance.
pub type ObjectRef = Rc<RefCell<Instance>>;

/// An instance of a registered class: field values in declaration order.
#[derive(Debug, Clone)]
pub struct Instance {
    pub class: ClassId,
    pub fields: Vec<Value>,
}

impl Instance {
    #[must_use]
    pub fn new(class: ClassId, fields: Vec<Value>) -> Self {
        Self { class, fields }
    }
}

/// A node of an object graph.
///
/// `Bool`, `Int`, `Float` and `Str` are plain values. `List`, `Map` and
/// `Object` are reference-counted handles; cloning one shares the instance,
/// and graphs may contain cycles through them.
///
/// Equality compares plain values by value and handles by identity, so
/// `a == b` on two objects means "the same instance".
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(ListRef),
    Map(MapRef),
    Object(ObjectRef),
}

impl Value {
    /// A new list instance.
    #[must_use]
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    /// A new map instance.
    #[must_use]
    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    /// A new instance of `class` with the given field values.
    #[must_use]
    pub fn object(class: ClassId, fields: Vec<Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(Instance::new(class, fields))))
    }

    /// Returns true if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The dispatch key of the runtime value; `None` for null.
    #[must_use]
    pub fn runtime_key(&self) -> Option<TypeKey> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(TypeKey::Bool),
            Value::Int(_) => Some(TypeKey::Int),
            Value::Float(_) => Some(TypeKey::Float),
            Value::Str(_) => Some(TypeKey::Str),
            Value::List(_) => Some(TypeKey::List),
            Value::Map(_) => Some(TypeKey::Map),
            Value::Object(o) => Some(TypeKey::Class(o.borrow().class)),
        }
    }

    /// A short name of the runtime kind, for error messages.
    #[must_use]
    pub fn kind(&self) -> String {
        match self.runtime_key() {
            Some(key) => key.to_string(),
            None => "null".to_owned(),
        }
    }

    /// Address of the shared instance, for identity-bearing values.
    #[must_use]
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::List(l) => Some(Rc::as_ptr(l) as *const () as usize),
            Value::Map(m) => Some(Rc::as_ptr(m) as *const () as usize),
            Value::Object(o) => Some(Rc::as_ptr(o) as *const () as usize),
            _ => None,
        }
    }

    /// Returns true if both values are handles to the same instance.
    #[must_use]
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Field `index` of an instance (cloned handle), or `None` if not an instance.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<Value> {
        self.as_object()
            .and_then(|o| o.borrow().fields.get(index).cloned())
    }

    /// Set field `index` of an instance. Returns false if there is no such field.
    pub fn set_field(&self, index: usize, value: Value) -> bool {
        let Some(obj) = self.as_object() else {
            return false;
        };
        match obj.borrow_mut().fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Element `index` of a list (cloned handle).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.as_list().and_then(|l| l.borrow().get(index).cloned())
    }

    /// Entry `key` of a map (cloned handle).
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<Value> {
        self.as_map().and_then(|m| m.borrow().get(key).cloned())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => self.same_instance(other),
        }
    }
}

// Handles print shallowly so cyclic graphs can be debugged.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(l) => write!(f, "List(len={} @{:p})", l.borrow().len(), Rc::as_ptr(l)),
            Value::Map(m) => write!(f, "Map(len={} @{:p})", m.borrow().len(), Rc::as_ptr(m)),
            Value::Object(o) => {
                let instance = o.borrow();
                write!(
                    f,
                    "Object(class#{}, fields={} @{:p})",
                    instance.class,
                    instance.fields.len(),
                    Rc::as_ptr(o)
                )
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}
