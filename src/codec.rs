// ABOUTME: The value codec dispatch contract and the default codecs for built-in kinds.
// ABOUTME: Container codecs hand their elements back to the engine so references are tracked.

use crate::engine::{ReadContext, WriteContext};
use crate::error::{Error, Result};
use crate::types::Type;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Encodes and decodes the payload of one kind of value.
///
/// The engine has already written or read the slot marker and any type tag
/// when a codec is called; `ty` is the resolved concrete type of the slot.
/// Codecs for identity-bearing types must call [`ReadContext::reference`]
/// with their instance shell *before* decoding any nested slot, so that
/// nested back-references to the instance resolve.
pub trait ValueCodec: Send + Sync {
    fn encode(&self, ctx: &mut WriteContext<'_>, ty: &Type, value: &Value) -> Result<()>;

    fn decode(&self, ctx: &mut ReadContext<'_, '_>, ty: &Type) -> Result<Value>;
}

/// Booleans as a single byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolCodec;

impl ValueCodec for BoolCodec {
    fn encode(&self, ctx: &mut WriteContext<'_>, ty: &Type, value: &Value) -> Result<()> {
        let b = value.as_bool().ok_or_else(|| Error::mismatch(ty, value.kind()))?;
        ctx.output().write_bool(b)
    }

    fn decode(&self, ctx: &mut ReadContext<'_, '_>, _ty: &Type) -> Result<Value> {
        ctx.input().read_bool().map(Value::Bool)
    }
}

/// Integers as zigzag varints.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntCodec;

impl ValueCodec for IntCodec {
    fn encode(&self, ctx: &mut WriteContext<'_>, ty: &Type, value: &Value) -> Result<()> {
        let n = value.as_i64().ok_or_else(|| Error::mismatch(ty, value.kind()))?;
        ctx.output().write_varint_signed(n)
    }

    fn decode(&self, ctx: &mut ReadContext<'_, '_>, _ty: &Type) -> Result<Value> {
        ctx.input().read_varint_signed().map(Value::Int)
    }
}

/// Floats as little-endian f64.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatCodec;

impl ValueCodec for FloatCodec {
    fn encode(&self, ctx: &mut WriteContext<'_>, ty: &Type, value: &Value) -> Result<()> {
        let x = value.as_f64().ok_or_else(|| Error::mismatch(ty, value.kind()))?;
        ctx.output().write_f64(x)
    }

    fn decode(&self, ctx: &mut ReadContext<'_, '_>, _ty: &Type) -> Result<Value> {
        ctx.input().read_f64().map(Value::Float)
    }
}

/// Strings as a varint length and UTF-8 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrCodec;

impl ValueCodec for StrCodec {
    fn encode(&self, ctx: &mut WriteContext<'_>, ty: &Type, value: &Value) -> Result<()> {
        let s = value.as_str().ok_or_else(|| Error::mismatch(ty, value.kind()))?;
        ctx.output().write_str(s)
    }

    fn decode(&self, ctx: &mut ReadContext<'_, '_>, _ty: &Type) -> Result<Value> {
        ctx.input().read_str().map(|s| Value::Str(s.to_owned()))
    }
}

/// Lists as a varint length followed by one slot per element.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListCodec;

fn element_type(ty: &Type) -> &Type {
    match ty {
        Type::List(elem) | Type::Map(elem) => elem,
        _ => &Type::Any,
    }
}

impl ValueCodec for ListCodec {
    fn encode(&self, ctx: &mut WriteContext<'_>, ty: &Type, value: &Value) -> Result<()> {
        let list = value.as_list().ok_or_else(|| Error::mismatch(ty, value.kind()))?;
        let elem = element_type(ty);
        let items = list.borrow();
        ctx.output().write_varint(items.len() as u64)?;
        for item in items.iter() {
            ctx.write_slot(item, elem)?;
        }
        Ok(())
    }

    fn decode(&self, ctx: &mut ReadContext<'_, '_>, ty: &Type) -> Result<Value> {
        let max = ctx.config().max_container_size;
        let len = ctx.input().read_len(max, Error::MaxContainerSizeExceeded)?;
        let shell = Rc::new(RefCell::new(Vec::with_capacity(len.min(1024))));
        ctx.reference(&Value::List(Rc::clone(&shell)));
        let elem = element_type(ty);
        for _ in 0..len {
            let item = ctx.read_slot(elem)?;
            shell.borrow_mut().push(item);
        }
        Ok(Value::List(shell))
    }
}

/// String-keyed maps as a varint length followed by key/value pairs in key order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapCodec;

impl ValueCodec for MapCodec {
    fn encode(&self, ctx: &mut WriteContext<'_>, ty: &Type, value: &Value) -> Result<()> {
        let map = value.as_map().ok_or_else(|| Error::mismatch(ty, value.kind()))?;
        let value_type = element_type(ty);
        let entries = map.borrow();
        ctx.output().write_varint(entries.len() as u64)?;
        for (key, entry) in entries.iter() {
            ctx.output().write_str(key)?;
            ctx.write_slot(entry, value_type)?;
        }
        Ok(())
    }

    fn decode(&self, ctx: &mut ReadContext<'_, '_>, ty: &Type) -> Result<Value> {
        let max = ctx.config().max_container_size;
        let len = ctx.input().read_len(max, Error::MaxContainerSizeExceeded)?;
        let shell = Rc::new(RefCell::new(BTreeMap::new()));
        ctx.reference(&Value::Map(Rc::clone(&shell)));
        let value_type = element_type(ty);
        for _ in 0..len {
            let key = ctx.input().read_str()?.to_owned();
            if shell.borrow().contains_key(&key) {
                return Err(Error::DuplicateKey(key));
            }
            let entry = ctx.read_slot(value_type)?;
            shell.borrow_mut().insert(key, entry);
        }
        Ok(Value::Map(shell))
    }
}
