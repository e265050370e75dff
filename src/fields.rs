// ABOUTME: Field-by-field codec for registered classes.
// ABOUTME: Binds the class's generic parameters for the duration of one instance, then walks its fields.

use crate::codec::ValueCodec;
use crate::engine::{ReadContext, WriteContext};
use crate::error::{Error, Result};
use crate::types::Type;
use crate::value::{Instance, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// The default codec for every registered class.
///
/// Fields are visited in declaration order on both sides. On read, the
/// instance is allocated with null fields and registered before any field
/// is decoded, so fields that point back at it resolve to the same instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldSerializer;

impl ValueCodec for FieldSerializer {
    fn encode(&self, ctx: &mut WriteContext<'_>, ty: &Type, value: &Value) -> Result<()> {
        let Type::Class(class, args) = ty else {
            return Err(Error::mismatch(ty, value.kind()));
        };
        let object = value
            .as_object()
            .ok_or_else(|| Error::mismatch(ty, value.kind()))?;
        let shape = ctx.registry().shape(*class)?;
        let instance = object.borrow();
        if instance.class != *class {
            return Err(Error::mismatch(ty, value.kind()));
        }
        if instance.fields.len() != shape.fields().len() {
            return Err(Error::InvalidData(format!(
                "instance of `{}` has {} fields, shape declares {}",
                shape.name(),
                instance.fields.len(),
                shape.fields().len()
            )));
        }

        ctx.with_class_scope(*class, shape.type_params().len(), args, |ctx| {
            for (slot, field) in shape.fields().iter().zip(instance.fields.iter()) {
                ctx.write_field(slot, field)?;
            }
            Ok(())
        })
    }

    fn decode(&self, ctx: &mut ReadContext<'_, '_>, ty: &Type) -> Result<Value> {
        let Type::Class(class, args) = ty else {
            return Err(Error::UnresolvedType(ty.to_string()));
        };
        let shape = ctx.registry().shape(*class)?;
        let shell = Rc::new(RefCell::new(Instance::new(
            *class,
            vec![Value::Null; shape.fields().len()],
        )));
        let value = Value::Object(Rc::clone(&shell));
        ctx.reference(&value);

        ctx.with_class_scope(*class, shape.type_params().len(), args, |ctx| {
            for (index, slot) in shape.fields().iter().enumerate() {
                let field = ctx.read_field(slot)?;
                shell.borrow_mut().fields[index] = field;
            }
            Ok(())
        })?;
        Ok(value)
    }
}
