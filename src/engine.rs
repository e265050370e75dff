// ABOUTME: Top-level write/read entry points and the per-call contexts codecs work through.
// ABOUTME: Each call resets the reference table and binding stack; output is staged until success.

use crate::codec::ValueCodec;
use crate::error::{Error, Result};
use crate::generics::{GenericsResolver, Scope};
use crate::input::{Input, ReadLimits};
use crate::output::Output;
use crate::references::{RefId, ReferenceTable};
use crate::registry::{FieldSlot, Registry};
use crate::types::{limits, marker, ClassId, Type, TypeKey};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;

/// Configuration options for an [`Engine`].
///
/// Writer and reader must use the same `references` setting; the other
/// options do not change the wire format except `max_generics_depth`,
/// which decides where runtime type tags are needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Track identity of lists, maps and instances (default: true)
    pub references: bool,
    /// Cache generic resolutions per binding frame (default: false)
    pub optimized_generics: bool,
    /// Recent binding frames checked for a repeated class parameter; 0 disables the bound
    pub max_generics_depth: usize,
    /// Maximum graph nesting depth
    pub max_depth: usize,
    /// Maximum elements in a list or map
    pub max_container_size: usize,
    /// Maximum string length in bytes
    pub max_string_length: usize,
    /// Allow NUL characters in strings (default: false)
    pub allow_nul: bool,
    /// Allow trailing bytes after the root value (default: false)
    pub allow_trailing_bytes: bool,
    /// Initial capacity of the staging output
    pub output_capacity: usize,
    /// Maximum bytes a single write may produce; `None` grows without bound
    pub max_output_size: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            references: true,
            optimized_generics: false,
            max_generics_depth: limits::MAX_GENERICS_DEPTH,
            max_depth: limits::MAX_DEPTH,
            max_container_size: limits::MAX_CONTAINER_SIZE,
            max_string_length: limits::MAX_STRING_LENGTH,
            allow_nul: false,
            allow_trailing_bytes: false,
            output_capacity: limits::OUTPUT_CAPACITY,
            max_output_size: None,
        }
    }
}

impl EngineConfig {
    /// Limits for the primitive reader.
    #[must_use]
    pub fn read_limits(&self) -> ReadLimits {
        ReadLimits {
            max_string_length: self.max_string_length,
            allow_nul: self.allow_nul,
            allow_trailing_bytes: self.allow_trailing_bytes,
        }
    }

    fn new_output(&self) -> Output {
        Output::bounded(self.output_capacity, self.max_output_size)
    }
}

/// State that lives for exactly one top-level call.
#[derive(Debug)]
struct CallState {
    refs: ReferenceTable,
    generics: GenericsResolver,
}

impl CallState {
    fn reset(&mut self) {
        self.refs.reset();
        self.generics.reset();
    }
}

/// Serializes object graphs against a shared [`Registry`].
///
/// An engine is not reentrant: every call takes `&mut self` and resets the
/// reference table and binding stack on entry. Use one engine per thread;
/// the registry can be shared through its `Arc`.
#[derive(Debug)]
pub struct Engine {
    registry: Arc<Registry>,
    config: EngineConfig,
    state: CallState,
    output: Output,
}

impl Engine {
    /// Create an engine with the default configuration.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_config(registry, EngineConfig::default())
    }

    /// Create an engine with a custom configuration.
    #[must_use]
    pub fn with_config(registry: Arc<Registry>, config: EngineConfig) -> Self {
        let state = CallState {
            refs: ReferenceTable::new(),
            generics: GenericsResolver::new(config.max_generics_depth, config.optimized_generics),
        };
        let output = config.new_output();
        Self {
            registry,
            config,
            state,
            output,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Reference ids assigned by the last call.
    #[must_use]
    pub fn references_assigned(&self) -> usize {
        self.state.refs.len()
    }

    /// Times generic resolution was cut off by the depth bound in the last call.
    #[must_use]
    pub fn generics_cutoffs(&self) -> usize {
        self.state.generics.cutoffs()
    }

    /// Append the encoding of `value`, declared as `ty`, to `output`.
    ///
    /// On failure everything this call appended is removed again.
    pub fn write_to(&mut self, output: &mut Output, value: &Value, ty: &Type) -> Result<()> {
        write_root(&self.registry, &self.config, &mut self.state, output, value, ty)
    }

    /// Encode `value`, declared as `ty`, and write it to `writer`.
    ///
    /// The writer receives nothing unless the whole graph encodes; it is
    /// flushed before this returns. Returns the number of bytes written.
    pub fn write_object<W: Write>(&mut self, writer: &mut W, value: &Value, ty: &Type) -> Result<usize> {
        self.output.clear();
        let result = write_root(&self.registry, &self.config, &mut self.state, &mut self.output, value, ty)
            .and_then(|()| self.output.flush_to(writer));
        self.output.clear();
        match &result {
            Ok(written) => log::debug!(
                "[engine] wrote {written} bytes, {} references, {} generics cut-offs",
                self.state.refs.len(),
                self.state.generics.cutoffs()
            ),
            Err(err) => log::debug!("[engine] write failed: {err}"),
        }
        result
    }

    /// Encode `value` with its runtime type tagged, so it can be read without a declared type.
    pub fn write_class_and_object<W: Write>(&mut self, writer: &mut W, value: &Value) -> Result<usize> {
        self.write_object(writer, value, &Type::Any)
    }

    /// Encode `value`, declared as `ty`, into a new byte vector.
    pub fn to_vec(&mut self, value: &Value, ty: &Type) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, value, ty)?;
        Ok(buf)
    }

    /// Decode one root value, declared as `ty`, from `input`.
    ///
    /// Does not require the input to be exhausted afterwards.
    pub fn read_from(&mut self, input: &mut Input<'_>, ty: &Type) -> Result<Value> {
        self.state.reset();
        let mut ctx = ReadContext {
            registry: self.registry.as_ref(),
            config: &self.config,
            refs: &mut self.state.refs,
            generics: &mut self.state.generics,
            input,
            scope: Scope::Unbound,
            depth: 0,
            pending: Vec::new(),
        };
        ctx.read_slot(ty)
    }

    /// Decode a complete document holding one root value declared as `ty`.
    pub fn read_object(&mut self, data: &[u8], ty: &Type) -> Result<Value> {
        let mut input = Input::with_limits(data, self.config.read_limits());
        let result = self.read_from(&mut input, ty).and_then(|value| {
            input.finish()?;
            Ok(value)
        });
        match &result {
            Ok(_) => log::debug!(
                "[engine] read {} bytes, {} references, {} generics cut-offs",
                input.position(),
                self.state.refs.len(),
                self.state.generics.cutoffs()
            ),
            Err(err) => log::debug!("[engine] read failed at byte {}: {err}", input.position()),
        }
        result
    }

    /// Decode a document written by [`write_class_and_object`](Self::write_class_and_object).
    pub fn read_class_and_object(&mut self, data: &[u8]) -> Result<Value> {
        self.read_object(data, &Type::Any)
    }
}

fn write_root(
    registry: &Registry,
    config: &EngineConfig,
    state: &mut CallState,
    output: &mut Output,
    value: &Value,
    ty: &Type,
) -> Result<()> {
    state.reset();
    let start = output.position();
    let mut ctx = WriteContext {
        registry,
        config,
        refs: &mut state.refs,
        generics: &mut state.generics,
        output,
        scope: Scope::Unbound,
        depth: 0,
    };
    let result = ctx.write_slot(value, ty);
    if result.is_err() {
        output.truncate(start);
    }
    result
}

// =============================================================================
// Write side
// =============================================================================

/// Per-call write state handed to codecs.
pub struct WriteContext<'e> {
    registry: &'e Registry,
    config: &'e EngineConfig,
    refs: &'e mut ReferenceTable,
    generics: &'e mut GenericsResolver,
    output: &'e mut Output,
    scope: Scope,
    depth: usize,
}

impl<'e> WriteContext<'e> {
    /// The sink codecs write payload bytes to.
    pub fn output(&mut self) -> &mut Output {
        self.output
    }

    #[must_use]
    pub fn registry(&self) -> &'e Registry {
        self.registry
    }

    #[must_use]
    pub fn config(&self) -> &'e EngineConfig {
        self.config
    }

    /// Write a value into a slot declared as `declared`.
    ///
    /// Writes the null marker, a back-reference, or the new-value marker
    /// followed by a type tag (when the resolved type is not concrete) and
    /// the payload.
    pub fn write_slot(&mut self, value: &Value, declared: &Type) -> Result<()> {
        let ty = self.generics.resolve(self.scope, declared);
        self.write_resolved(value, ty)
    }

    /// Write one field of an instance.
    ///
    /// Non-nullable fields of concrete, untracked types carry no marker.
    pub fn write_field(&mut self, slot: &FieldSlot, value: &Value) -> Result<()> {
        if value.is_null() && !slot.nullable {
            return Err(Error::NullNotAllowed(slot.name.clone()));
        }
        let ty = self.generics.resolve(self.scope, &slot.declared);
        match ty.key() {
            Some(key) if !slot.nullable && !self.tracks(key) => {
                if value.runtime_key() != Some(key) {
                    return Err(Error::mismatch(self.registry.describe(&ty), value.kind()));
                }
                let codec = self.registry().codec_for(key)?;
                self.encode_with(codec, &ty, value)
            }
            _ => self.write_resolved(value, ty),
        }
    }

    /// Run `f` with the generic parameters of `class` bound from `args`.
    pub fn with_class_scope<T>(
        &mut self,
        class: ClassId,
        param_count: usize,
        args: &[Type],
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let scope = self.generics.enter(class, param_count, args, self.scope);
        let previous = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = previous;
        self.generics.exit(scope);
        result
    }

    fn tracks(&self, key: TypeKey) -> bool {
        self.config.references && key.is_identity()
    }

    fn write_resolved(&mut self, value: &Value, ty: Type) -> Result<()> {
        let Some(runtime) = value.runtime_key() else {
            return self.output.write_varint(marker::NULL);
        };
        let key = ty.key().unwrap_or(runtime);
        if key != runtime {
            return Err(Error::mismatch(self.registry.describe(&ty), value.kind()));
        }
        let codec = self.registry().codec_for(key)?;

        if self.tracks(key) {
            if let Some(id) = self.refs.register(value) {
                return self.output.write_varint(marker::REF_BASE + id);
            }
        }

        self.output.write_varint(marker::NEW)?;
        let ty = if ty.key().is_some() {
            ty
        } else {
            self.output.write_varint(key.tag())?;
            key.erased()
        };
        self.encode_with(codec, &ty, value)
    }

    fn encode_with(&mut self, codec: &dyn ValueCodec, ty: &Type, value: &Value) -> Result<()> {
        if self.depth >= self.config.max_depth {
            return Err(Error::MaxDepthExceeded);
        }
        self.depth += 1;
        let result = codec.encode(self, ty, value);
        self.depth -= 1;
        result
    }
}

// =============================================================================
// Read side
// =============================================================================

/// A reference id reserved for a value whose codec is running at `depth`.
#[derive(Debug, Clone, Copy)]
struct Pending {
    id: RefId,
    depth: usize,
}

/// Per-call read state handed to codecs.
pub struct ReadContext<'e, 'a> {
    registry: &'e Registry,
    config: &'e EngineConfig,
    refs: &'e mut ReferenceTable,
    generics: &'e mut GenericsResolver,
    input: &'e mut Input<'a>,
    scope: Scope,
    depth: usize,
    pending: Vec<Pending>,
}

impl<'e, 'a> ReadContext<'e, 'a> {
    /// The source codecs read payload bytes from.
    pub fn input(&mut self) -> &mut Input<'a> {
        self.input
    }

    #[must_use]
    pub fn registry(&self) -> &'e Registry {
        self.registry
    }

    #[must_use]
    pub fn config(&self) -> &'e EngineConfig {
        self.config
    }

    /// Register the instance being decoded by the calling codec.
    ///
    /// Must be called with the (possibly still empty) instance before any
    /// nested slot is read. Calls from codecs of untracked types are ignored.
    pub fn reference(&mut self, value: &Value) {
        if let Some(pending) = self.pending.last().copied() {
            if pending.depth == self.depth {
                self.pending.pop();
                self.refs.fill(pending.id, value.clone());
            }
        }
    }

    /// Read a value from a slot declared as `declared`.
    pub fn read_slot(&mut self, declared: &Type) -> Result<Value> {
        let ty = self.generics.resolve(self.scope, declared);
        self.read_resolved(ty)
    }

    /// Read one field of an instance; the mirror of [`WriteContext::write_field`].
    pub fn read_field(&mut self, slot: &FieldSlot) -> Result<Value> {
        let ty = self.generics.resolve(self.scope, &slot.declared);
        match ty.key() {
            Some(key) if !slot.nullable && !self.tracks(key) => {
                let codec = self.registry().codec_for(key)?;
                self.decode_with(codec, &ty)
            }
            _ => {
                let value = self.read_resolved(ty)?;
                if value.is_null() && !slot.nullable {
                    return Err(Error::NullNotAllowed(slot.name.clone()));
                }
                Ok(value)
            }
        }
    }

    /// Run `f` with the generic parameters of `class` bound from `args`.
    pub fn with_class_scope<T>(
        &mut self,
        class: ClassId,
        param_count: usize,
        args: &[Type],
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let scope = self.generics.enter(class, param_count, args, self.scope);
        let previous = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = previous;
        self.generics.exit(scope);
        result
    }

    fn tracks(&self, key: TypeKey) -> bool {
        self.config.references && key.is_identity()
    }

    fn read_resolved(&mut self, ty: Type) -> Result<Value> {
        match self.input.read_varint()? {
            marker::NULL => return Ok(Value::Null),
            marker::NEW => {}
            m if self.config.references => {
                let value = self.refs.resolve(m - marker::REF_BASE)?;
                if let Some(key) = ty.key() {
                    if value.runtime_key() != Some(key) {
                        return Err(Error::mismatch(self.registry.describe(&ty), value.kind()));
                    }
                }
                return Ok(value);
            }
            m => return Err(Error::InvalidMarker(m)),
        }

        let (key, ty) = match ty.key() {
            Some(key) => (key, ty),
            None => {
                let key = TypeKey::from_tag(self.input.read_varint()?)?;
                (key, key.erased())
            }
        };
        let codec = self.registry().codec_for(key)?;

        if !self.tracks(key) {
            return self.decode_with(codec, &ty);
        }

        let id = self.refs.reserve();
        self.pending.push(Pending {
            id,
            depth: self.depth + 1,
        });
        let value = self.decode_with(codec, &ty)?;
        if self.pending.last().is_some_and(|p| p.id == id) {
            self.pending.pop();
            self.refs.fill(id, value.clone());
        }
        Ok(value)
    }

    fn decode_with(&mut self, codec: &dyn ValueCodec, ty: &Type) -> Result<Value> {
        if self.depth >= self.config.max_depth {
            return Err(Error::MaxDepthExceeded);
        }
        self.depth += 1;
        let result = codec.decode(self, ty);
        self.depth -= 1;
        result
    }
}
