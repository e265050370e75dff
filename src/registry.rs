// ABOUTME: Class shapes and the registry mapping classes and type keys to value codecs.
// ABOUTME: Shapes are immutable once defined; the registry is shared read-only between engines.

use crate::codec::{BoolCodec, FloatCodec, IntCodec, ListCodec, MapCodec, StrCodec, ValueCodec};
use crate::error::{Error, Result};
use crate::fields::FieldSerializer;
use crate::types::{ClassId, Type, TypeKey};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One serializable field of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlot {
    pub name: String,
    pub declared: Type,
    pub nullable: bool,
}

impl FieldSlot {
    /// A nullable field.
    #[must_use]
    pub fn new(name: impl Into<String>, declared: Type) -> Self {
        Self {
            name: name.into(),
            declared,
            nullable: true,
        }
    }

    /// A field that may never hold null.
    #[must_use]
    pub fn required(name: impl Into<String>, declared: Type) -> Self {
        Self {
            nullable: false,
            ..Self::new(name, declared)
        }
    }

    /// The enclosing class's parameter index, if the field is declared as a bare type variable.
    #[must_use]
    pub fn generic_index(&self) -> Option<usize> {
        match self.declared {
            Type::Var(i) => Some(i),
            _ => None,
        }
    }
}

/// The serializable layout of a class: generic parameters and fields in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassShape {
    name: String,
    type_params: Vec<String>,
    fields: Vec<FieldSlot>,
}

impl ClassShape {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_params: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Add a generic parameter. Parameters are referenced by `Type::Var(index)`.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.type_params.push(name.into());
        self
    }

    /// Add a nullable field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, declared: Type) -> Self {
        self.fields.push(FieldSlot::new(name, declared));
        self
    }

    /// Add a non-nullable field.
    #[must_use]
    pub fn required_field(mut self, name: impl Into<String>, declared: Type) -> Self {
        self.fields.push(FieldSlot::required(name, declared));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn type_params(&self) -> &[String] {
        &self.type_params
    }

    /// Fields in declaration order, which is also the wire order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSlot] {
        &self.fields
    }

    /// Index of the field called `name`.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    fn validate(&self) -> Result<()> {
        for field in &self.fields {
            if let Some(max) = field.declared.max_var() {
                if max >= self.type_params.len() {
                    return Err(Error::InvalidData(format!(
                        "field `{}.{}` uses type variable T{max} but the class has {} parameters",
                        self.name,
                        field.name,
                        self.type_params.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Class shapes and the codec table.
///
/// Classes get sequential ids. A class can be declared first and defined
/// later, so mutually referencing classes can name each other's ids.
pub struct Registry {
    classes: Vec<Option<ClassShape>>,
    names: HashMap<String, ClassId>,
    codecs: HashMap<TypeKey, Arc<dyn ValueCodec>>,
    class_codec: Arc<dyn ValueCodec>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("classes", &self.classes.len())
            .field("codecs", &self.codecs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// A registry with the default codecs for the built-in kinds.
    #[must_use]
    pub fn new() -> Self {
        let mut codecs: HashMap<TypeKey, Arc<dyn ValueCodec>> = HashMap::new();
        codecs.insert(TypeKey::Bool, Arc::new(BoolCodec));
        codecs.insert(TypeKey::Int, Arc::new(IntCodec));
        codecs.insert(TypeKey::Float, Arc::new(FloatCodec));
        codecs.insert(TypeKey::Str, Arc::new(StrCodec));
        codecs.insert(TypeKey::List, Arc::new(ListCodec));
        codecs.insert(TypeKey::Map, Arc::new(MapCodec));
        Self {
            classes: Vec::new(),
            names: HashMap::new(),
            codecs,
            class_codec: Arc::new(FieldSerializer),
        }
    }

    /// The id the next declared class will receive.
    #[must_use]
    pub fn next_id(&self) -> ClassId {
        self.classes.len() as ClassId
    }

    /// Number of declared classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Reserve an id for `name` without defining its shape yet.
    pub fn declare(&mut self, name: impl Into<String>) -> Result<ClassId> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(Error::DuplicateClass(name));
        }
        let id = self.next_id();
        self.classes.push(None);
        self.names.insert(name, id);
        Ok(id)
    }

    /// Define the shape of a declared class. Shapes cannot be redefined.
    pub fn define(&mut self, id: ClassId, shape: ClassShape) -> Result<()> {
        shape.validate()?;
        if self.names.get(shape.name()) != Some(&id) {
            return Err(Error::InvalidData(format!(
                "class `{}` was not declared as class#{id}",
                shape.name()
            )));
        }
        let slot = self
            .classes
            .get_mut(id as usize)
            .ok_or_else(|| Error::UnresolvedType(format!("class#{id}")))?;
        if slot.is_some() {
            return Err(Error::DuplicateClass(shape.name().to_owned()));
        }
        *slot = Some(shape);
        Ok(())
    }

    /// Declare and define a class in one step.
    pub fn register(&mut self, shape: ClassShape) -> Result<ClassId> {
        shape.validate()?;
        let id = self.declare(shape.name().to_owned())?;
        self.define(id, shape)?;
        Ok(id)
    }

    /// The shape of a defined class.
    pub fn shape(&self, id: ClassId) -> Result<&ClassShape> {
        self.classes
            .get(id as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::UnresolvedType(format!("class#{id}")))
    }

    /// The id of the class called `name`.
    #[must_use]
    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.names.get(name).copied()
    }

    /// Override the codec for a type key.
    pub fn register_codec(&mut self, key: TypeKey, codec: Arc<dyn ValueCodec>) {
        self.codecs.insert(key, codec);
    }

    /// The codec for a type key.
    ///
    /// Classes without an explicit codec use the field serializer, provided
    /// their shape is defined.
    pub fn codec_for(&self, key: TypeKey) -> Result<&dyn ValueCodec> {
        if let Some(codec) = self.codecs.get(&key) {
            return Ok(codec.as_ref());
        }
        match key {
            TypeKey::Class(id) => {
                self.shape(id)?;
                Ok(self.class_codec.as_ref())
            }
            other => Err(Error::UnresolvedType(other.to_string())),
        }
    }

    /// Human-readable rendering of a type using registered class names.
    #[must_use]
    pub fn describe(&self, ty: &Type) -> String {
        match ty {
            Type::List(elem) => format!("list<{}>", self.describe(elem)),
            Type::Map(value) => format!("map<str, {}>", self.describe(value)),
            Type::Class(id, args) => {
                let name = self
                    .shape(*id)
                    .map_or_else(|_| format!("class#{id}"), |s| s.name().to_owned());
                if args.is_empty() {
                    name
                } else {
                    let args: Vec<String> = args.iter().map(|a| self.describe(a)).collect();
                    format!("{name}<{}>", args.join(", "))
                }
            }
            other => other.to_string(),
        }
    }
}
