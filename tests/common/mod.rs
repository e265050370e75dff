// ABOUTME: Shared helpers for the integration tests.
// ABOUTME: Graph isomorphism check and engine configurations for both generics modes.

#![allow(dead_code)]

use graphcodec::{Engine, EngineConfig, Registry, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Default configuration with plain and cached generic resolution.
pub fn modes() -> [EngineConfig; 2] {
    [false, true].map(|optimized| EngineConfig {
        optimized_generics: optimized,
        ..EngineConfig::default()
    })
}

/// One engine per generics mode, sharing `registry`.
pub fn engines(registry: &Arc<Registry>) -> [Engine; 2] {
    modes().map(|config| Engine::with_config(Arc::clone(registry), config))
}

/// Returns true if `a` and `b` have the same shape, plain values and sharing.
///
/// Identity-bearing values must map one-to-one: two references to the same
/// instance in `a` must be references to the same instance in `b`, and
/// distinct instances must stay distinct.
pub fn isomorphic(a: &Value, b: &Value) -> bool {
    let mut forward = HashMap::new();
    let mut backward = HashMap::new();
    walk(a, b, &mut forward, &mut backward)
}

fn walk(
    a: &Value,
    b: &Value,
    forward: &mut HashMap<usize, usize>,
    backward: &mut HashMap<usize, usize>,
) -> bool {
    match (a.identity(), b.identity()) {
        (Some(x), Some(y)) => {
            match (forward.get(&x), backward.get(&y)) {
                (Some(&mapped), _) => return mapped == y,
                (None, Some(_)) => return false,
                (None, None) => {
                    forward.insert(x, y);
                    backward.insert(y, x);
                }
            }
        }
        (None, None) => return a == b,
        _ => return false,
    }

    match (a, b) {
        (Value::List(x), Value::List(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|(p, q)| walk(p, q, forward, backward))
        }
        (Value::Map(x), Value::Map(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|((kp, p), (kq, q))| kp == kq && walk(p, q, forward, backward))
        }
        (Value::Object(x), Value::Object(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.class == y.class
                && x.fields.len() == y.fields.len()
                && x.fields
                    .iter()
                    .zip(y.fields.iter())
                    .all(|(p, q)| walk(p, q, forward, backward))
        }
        _ => false,
    }
}
