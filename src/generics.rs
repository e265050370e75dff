// ABOUTME: Scoped generic-parameter bindings and the depth-bounded resolver built on them.
// ABOUTME: Repeated (class, parameter) frames within the window cut resolution off to the erased type.

use crate::types::{ClassId, Type};
use std::collections::HashMap;

/// How one generic parameter of a frame is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// A concrete type, fully substituted.
    Concrete(Type),
    /// Forwards to parameter `param` of the enclosing frame at index `frame`.
    Outer { frame: usize, param: usize },
    /// Nothing known; values of this parameter are written with a type tag.
    Unresolved,
}

impl Binding {
    #[inline]
    #[must_use]
    pub fn is_bound(&self) -> bool {
        !matches!(self, Binding::Unresolved)
    }
}

/// Bindings for the parameters of one class while one of its values is serialized.
#[derive(Debug, Clone)]
pub struct TypeBinding {
    pub class: ClassId,
    pub serial: u64,
    pub params: Vec<Binding>,
}

/// Stack of [`TypeBinding`] frames, innermost last.
#[derive(Debug, Default)]
pub struct TypeBindingStack {
    frames: Vec<TypeBinding>,
    next_serial: u64,
}

impl TypeBindingStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame and return its index.
    pub fn push(&mut self, class: ClassId, params: Vec<Binding>) -> usize {
        let serial = self.next_serial;
        self.next_serial += 1;
        self.frames.push(TypeBinding {
            class,
            serial,
            params,
        });
        self.frames.len() - 1
    }

    /// Pop the innermost frame.
    pub fn pop(&mut self) -> Option<TypeBinding> {
        self.frames.pop()
    }

    /// Drop frame `index` and everything above it.
    pub fn truncate(&mut self, index: usize) {
        self.frames.truncate(index);
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TypeBinding> {
        self.frames.get(index)
    }

    #[must_use]
    pub fn top(&self) -> Option<&TypeBinding> {
        self.frames.last()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn reset(&mut self) {
        self.frames.clear();
        self.next_serial = 0;
    }

    /// Returns true if one of the last `window` frames binds parameter `param` of `class`.
    #[must_use]
    pub fn binds_within(&self, class: ClassId, param: usize, window: usize) -> bool {
        self.frames.iter().rev().take(window).any(|frame| {
            frame.class == class && frame.params.get(param).is_some_and(Binding::is_bound)
        })
    }

    /// Follow parameter `param` of frame `index` outward until a concrete binding.
    ///
    /// Terminates because `Outer` always points at a lower frame.
    #[must_use]
    pub fn walk(&self, mut index: usize, mut param: usize) -> Option<Type> {
        loop {
            match self.frames.get(index)?.params.get(param)? {
                Binding::Concrete(ty) => return Some(ty.clone()),
                Binding::Outer { frame, param: outer } => {
                    debug_assert!(*frame < index);
                    index = *frame;
                    param = *outer;
                }
                Binding::Unresolved => return None,
            }
        }
    }
}

/// The generic context of the value currently being serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// The value's parameters are bound by the frame at `frame`.
    Bound { frame: usize, serial: u64 },
    /// The value's class has no bound parameters.
    #[default]
    Unbound,
    /// Binding was cut off by the depth bound; parameters fall back to the erased type.
    CutOff,
}

/// Computes concrete types for declared field types.
///
/// Resolution never fails: anything that cannot be resolved, or whose
/// resolution is cut off by the depth bound, degrades to [`Type::Any`],
/// which the engine encodes with a runtime type tag.
#[derive(Debug)]
pub struct GenericsResolver {
    stack: TypeBindingStack,
    max_depth: usize,
    optimized: bool,
    cache: HashMap<(ClassId, usize, u64), Option<Type>>,
    cutoffs: usize,
}

impl GenericsResolver {
    /// `max_depth` is the number of recent frames checked for a repeated
    /// (class, parameter) binding; 0 disables the check.
    #[must_use]
    pub fn new(max_depth: usize, optimized: bool) -> Self {
        Self {
            stack: TypeBindingStack::new(),
            max_depth,
            optimized,
            cache: HashMap::new(),
            cutoffs: 0,
        }
    }

    /// Clear all frames, cached resolutions and counters.
    pub fn reset(&mut self) {
        self.stack.reset();
        self.cache.clear();
        self.cutoffs = 0;
    }

    /// Number of times resolution was cut off since the last reset.
    #[must_use]
    pub fn cutoffs(&self) -> usize {
        self.cutoffs
    }

    #[must_use]
    pub fn stack(&self) -> &TypeBindingStack {
        &self.stack
    }

    /// Enter a value of `class` declared with `args`, from within `enclosing`.
    ///
    /// Pushes a frame when at least one of the `param_count` parameters is
    /// bound, unless a frame binding the same (class, parameter) pair sits
    /// within the last `max_depth` frames.
    pub fn enter(
        &mut self,
        class: ClassId,
        param_count: usize,
        args: &[Type],
        enclosing: Scope,
    ) -> Scope {
        if param_count == 0 {
            return Scope::Unbound;
        }

        let params: Vec<Binding> = (0..param_count)
            .map(|i| match args.get(i) {
                None | Some(Type::Any | Type::Wildcard) => Binding::Unresolved,
                Some(Type::Var(j)) => match enclosing {
                    Scope::Bound { frame, .. } if self.lookup(enclosing, *j).is_some() => {
                        Binding::Outer { frame, param: *j }
                    }
                    _ => Binding::Unresolved,
                },
                Some(ty) => Binding::Concrete(self.substitute(enclosing, ty)),
            })
            .collect();

        if !params.iter().any(Binding::is_bound) {
            return Scope::Unbound;
        }

        if self.max_depth > 0 {
            let repeated = params.iter().enumerate().any(|(i, binding)| {
                binding.is_bound() && self.stack.binds_within(class, i, self.max_depth)
            });
            if repeated {
                self.cutoffs += 1;
                log::trace!(
                    "[generics] class#{class} already bound within {} frames at depth {}, using erased type",
                    self.max_depth,
                    self.stack.depth()
                );
                return Scope::CutOff;
            }
        }

        let frame = self.stack.push(class, params);
        let serial = self.stack.get(frame).map_or(0, |f| f.serial);
        Scope::Bound { frame, serial }
    }

    /// Leave a scope returned by [`enter`](Self::enter), popping its frame.
    pub fn exit(&mut self, scope: Scope) {
        if let Scope::Bound { frame, serial } = scope {
            self.stack.truncate(frame);
            if self.optimized {
                self.cache.retain(|key, _| key.2 != serial);
            }
        }
    }

    /// Resolve a declared field type within `scope`.
    ///
    /// Type variables in value position are replaced by their binding (or
    /// `Any`). Class arguments are left as declared; they become bindings
    /// when the class's value is entered.
    pub fn resolve(&mut self, scope: Scope, declared: &Type) -> Type {
        match declared {
            Type::Var(i) => self.lookup(scope, *i).unwrap_or(Type::Any),
            Type::Wildcard => Type::Any,
            Type::List(elem) if elem.has_vars() => Type::list(self.resolve(scope, elem)),
            Type::Map(value) if value.has_vars() => Type::map(self.resolve(scope, value)),
            other => other.clone(),
        }
    }

    /// Replace every type variable in `ty`, including class arguments.
    fn substitute(&mut self, scope: Scope, ty: &Type) -> Type {
        match ty {
            Type::Var(i) => self.lookup(scope, *i).unwrap_or(Type::Any),
            Type::List(elem) => Type::list(self.substitute(scope, elem)),
            Type::Map(value) => Type::map(self.substitute(scope, value)),
            Type::Class(id, args) if ty.has_vars() => Type::Class(
                *id,
                args.iter().map(|arg| self.substitute(scope, arg)).collect(),
            ),
            other => other.clone(),
        }
    }

    fn lookup(&mut self, scope: Scope, param: usize) -> Option<Type> {
        let Scope::Bound { frame, serial } = scope else {
            return None;
        };
        if !self.optimized {
            return self.stack.walk(frame, param);
        }
        let class = self.stack.get(frame)?.class;
        let key = (class, param, serial);
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }
        let resolved = self.stack.walk(frame, param);
        self.cache.insert(key, resolved.clone());
        resolved
    }
}
