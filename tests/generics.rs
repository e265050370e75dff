// ABOUTME: Integration tests for generic type resolution over self-referential graphs.
// ABOUTME: Every scenario runs in both resolution modes and compares the encodings.

mod common;

use common::{engines, isomorphic};
use graphcodec::{ClassId, ClassShape, Engine, EngineConfig, Registry, Type, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A map holding `this` under "myself".
fn self_map(this: &Value) -> Value {
    let mut entries = BTreeMap::new();
    entries.insert("myself".to_owned(), this.clone());
    Value::map(entries)
}

/// Encode `root` as `ty` in both modes, check the encodings match, and
/// return the decoded graph of each mode.
fn roundtrip_both_modes(registry: &Arc<Registry>, root: &Value, ty: &Type) -> Vec<Value> {
    let [mut plain, mut optimized] = engines(registry);
    let plain_bytes = plain.to_vec(root, ty).unwrap();
    let optimized_bytes = optimized.to_vec(root, ty).unwrap();
    assert_eq!(plain_bytes, optimized_bytes);
    assert_eq!(plain.generics_cutoffs(), optimized.generics_cutoffs());

    let decoded = vec![
        plain.read_object(&plain_bytes, ty).unwrap(),
        optimized.read_object(&optimized_bytes, ty).unwrap(),
    ];
    for graph in &decoded {
        assert!(isomorphic(root, graph));
    }
    decoded
}

// =============================================================================
// Wrapper with a container that lists every wrapper
// =============================================================================

struct Foos {
    registry: Arc<Registry>,
    foo_ref: ClassId,
    generic_foo: ClassId,
    foo_container: ClassId,
}

fn foos() -> Foos {
    let mut registry = Registry::new();
    let foo_ref = registry.register(ClassShape::new("FooRef")).unwrap();
    let generic_foo = registry.declare("GenericFoo").unwrap();
    let foo_container = registry.declare("FooContainer").unwrap();
    registry
        .define(
            generic_foo,
            ClassShape::new("GenericFoo")
                .param("B")
                .field("map", Type::map(Type::Any))
                .field("foo", Type::Var(0))
                .field("container", Type::class(foo_container)),
        )
        .unwrap();
    registry
        .define(
            foo_container,
            ClassShape::new("FooContainer").field(
                "foos",
                Type::list(Type::generic(generic_foo, vec![Type::Wildcard])),
            ),
        )
        .unwrap();
    Foos {
        registry: Arc::new(registry),
        foo_ref,
        generic_foo,
        foo_container,
    }
}

#[test]
fn test_generic_wrapper_in_shared_container() {
    let f = foos();
    let foo_ref = Value::object(f.foo_ref, vec![]);
    let wrap = |inner: &Value| {
        let foo = Value::object(f.generic_foo, vec![Value::Null, inner.clone(), Value::Null]);
        foo.set_field(0, self_map(&foo));
        foo
    };
    let foo1 = wrap(&foo_ref);
    let foo2 = wrap(&foo_ref);
    let container = Value::object(
        f.foo_container,
        vec![Value::list(vec![foo2.clone(), foo1.clone()])],
    );
    foo1.set_field(2, container.clone());
    foo2.set_field(2, container);

    let ty = Type::generic(f.generic_foo, vec![Type::class(f.foo_ref)]);
    for decoded in roundtrip_both_modes(&f.registry, &foo1, &ty) {
        let map = decoded.field(0).unwrap();
        assert!(map.get_key("myself").unwrap().same_instance(&decoded));

        let listed = decoded.field(2).and_then(|c| c.field(0)).unwrap();
        assert!(listed.get(1).unwrap().same_instance(&decoded));
        let other = listed.get(0).unwrap();
        assert!(other.field(1).unwrap().same_instance(&decoded.field(1).unwrap()));
    }
}

// =============================================================================
// Wrapper whose container is itself generic
// =============================================================================

struct Bars {
    registry: Arc<Registry>,
    bar_ref: ClassId,
    generic_bar: ClassId,
    generic_bar_container: ClassId,
    bar_container: ClassId,
}

fn bars() -> Bars {
    let mut registry = Registry::new();
    let bar_ref = registry.register(ClassShape::new("BarRef")).unwrap();
    let generic_bar = registry.declare("GenericBar").unwrap();
    let generic_bar_container = registry.declare("GenericBarContainer").unwrap();
    let bar_container = registry
        .register(ClassShape::new("BarContainer").field(
            "foos",
            Type::list(Type::generic(generic_bar, vec![Type::Wildcard])),
        ))
        .unwrap();
    registry
        .define(
            generic_bar,
            ClassShape::new("GenericBar")
                .param("B")
                .field("map", Type::map(Type::Any))
                .field("foo", Type::Var(0))
                .field(
                    "container",
                    Type::generic(generic_bar_container, vec![Type::Wildcard]),
                ),
        )
        .unwrap();
    registry
        .define(
            generic_bar_container,
            ClassShape::new("GenericBarContainer")
                .param("T")
                .field("bar_container", Type::class(bar_container)),
        )
        .unwrap();
    Bars {
        registry: Arc::new(registry),
        bar_ref,
        generic_bar,
        generic_bar_container,
        bar_container,
    }
}

#[test]
fn test_generic_wrapper_in_generic_container() {
    let b = bars();
    let bar_ref = Value::object(b.bar_ref, vec![]);
    let wrap = |inner: &Value| {
        let bar = Value::object(b.generic_bar, vec![Value::Null, inner.clone(), Value::Null]);
        bar.set_field(0, self_map(&bar));
        bar
    };
    let bar1 = wrap(&bar_ref);
    let bar2 = wrap(&bar_ref);
    let bar_container = Value::object(
        b.bar_container,
        vec![Value::list(vec![bar2.clone(), bar1.clone()])],
    );
    let outer = Value::object(b.generic_bar_container, vec![bar_container]);
    bar1.set_field(2, outer.clone());
    bar2.set_field(2, outer);

    let ty = Type::generic(b.generic_bar, vec![Type::class(b.bar_ref)]);
    for decoded in roundtrip_both_modes(&b.registry, &bar1, &ty) {
        let outer = decoded.field(2).unwrap();
        let listed = outer.field(0).and_then(|c| c.field(0)).unwrap();
        assert!(listed.get(1).unwrap().same_instance(&decoded));
        assert!(listed.get(0).unwrap().field(2).unwrap().same_instance(&outer));
    }

    // Writing from the container side walks the same graph in a different order
    let ty = Type::generic(b.generic_bar_container, vec![Type::generic(b.generic_bar, vec![])]);
    let root = bar1.field(2).unwrap();
    roundtrip_both_modes(&b.registry, &root, &ty);
}

// =============================================================================
// Recursive generic node
// =============================================================================

struct Nodes {
    registry: Arc<Registry>,
    node: ClassId,
    payload: ClassId,
}

/// `Node<B> { value: B, next: Node<B> }` and `Payload { label: str }`.
fn nodes() -> Nodes {
    let mut registry = Registry::new();
    let node = registry.next_id();
    registry
        .register(
            ClassShape::new("Node")
                .param("B")
                .field("value", Type::Var(0))
                .field("next", Type::generic(node, vec![Type::Var(0)])),
        )
        .unwrap();
    let payload = registry
        .register(ClassShape::new("Payload").required_field("label", Type::Str))
        .unwrap();
    Nodes {
        registry: Arc::new(registry),
        node,
        payload,
    }
}

fn chain(n: &Nodes, values: &[i64]) -> Value {
    values.iter().rev().fold(Value::Null, |next, &v| {
        Value::object(n.node, vec![Value::Int(v), next])
    })
}

#[test]
fn test_cut_off_falls_back_to_tagged_values() {
    let n = nodes();
    let list = chain(&n, &[1, 2, 3]);
    let ty = Type::generic(n.node, vec![Type::Int]);

    let decoded = roundtrip_both_modes(&n.registry, &list, &ty);
    for graph in decoded {
        let values: Vec<Option<i64>> = [
            graph.field(0),
            graph.field(1).and_then(|v| v.field(0)),
            graph.field(1).and_then(|v| v.field(1)).and_then(|v| v.field(0)),
        ]
        .iter()
        .map(|v| v.as_ref().and_then(Value::as_i64))
        .collect();
        assert_eq!(values, vec![Some(1), Some(2), Some(3)]);
    }

    let mut engine = Engine::new(Arc::clone(&n.registry));
    let bounded = engine.to_vec(&list, &ty).unwrap();
    assert_eq!(engine.generics_cutoffs(), 1);
    engine.read_object(&bounded, &ty).unwrap();
    assert_eq!(engine.generics_cutoffs(), 1);

    // Without the bound every level stays resolved and no value needs a tag
    let config = EngineConfig {
        max_generics_depth: 0,
        ..EngineConfig::default()
    };
    let mut unbounded_engine = Engine::with_config(Arc::clone(&n.registry), config);
    let unbounded = unbounded_engine.to_vec(&list, &ty).unwrap();
    assert_eq!(unbounded_engine.generics_cutoffs(), 0);
    assert_eq!(unbounded.len() + 2, bounded.len());
    assert!(isomorphic(
        &list,
        &unbounded_engine.read_object(&unbounded, &ty).unwrap()
    ));
}

#[test]
fn test_deep_recursive_generics_terminate() {
    let n = nodes();
    let values: Vec<i64> = (0..100).collect();
    let list = chain(&n, &values);
    let ty = Type::generic(n.node, vec![Type::Int]);

    for decoded in roundtrip_both_modes(&n.registry, &list, &ty) {
        let mut cursor = decoded;
        for expected in 0..100 {
            assert_eq!(cursor.field(0), Some(Value::Int(expected)));
            cursor = cursor.field(1).unwrap();
        }
        assert!(cursor.is_null());
    }
}

#[test]
fn test_self_referencing_node_with_shared_payload() {
    let n = nodes();
    let shared = Value::object(n.payload, vec![Value::from("shared")]);
    let n1 = Value::object(n.node, vec![shared.clone(), Value::Null]);
    n1.set_field(1, n1.clone());
    let n2 = Value::object(n.node, vec![shared, n1.clone()]);
    let container = Value::list(vec![n2, n1.clone()]);

    let node_of_payload = Type::generic(n.node, vec![Type::class(n.payload)]);

    for decoded in roundtrip_both_modes(&n.registry, &n1, &node_of_payload) {
        assert!(decoded.field(1).unwrap().same_instance(&decoded));
        assert_eq!(
            decoded.field(0).and_then(|p| p.field(0)),
            Some(Value::from("shared"))
        );
    }

    let list_type = Type::list(node_of_payload);
    for decoded in roundtrip_both_modes(&n.registry, &container, &list_type) {
        let n2 = decoded.get(0).unwrap();
        let n1 = decoded.get(1).unwrap();
        assert!(n1.field(1).unwrap().same_instance(&n1));
        assert!(n2.field(1).unwrap().same_instance(&n1));
        assert!(n1.field(0).unwrap().same_instance(&n2.field(0).unwrap()));
    }
}

#[test]
fn test_bound_parameter_skips_type_tag() {
    let n = nodes();
    let leaf = Value::object(n.node, vec![Value::Int(7), Value::Null]);

    let mut engine = Engine::new(Arc::clone(&n.registry));
    let bound = engine
        .to_vec(&leaf, &Type::generic(n.node, vec![Type::Int]))
        .unwrap();
    let erased = engine.to_vec(&leaf, &Type::class(n.node)).unwrap();
    // NEW, value NEW + int, next null
    assert_eq!(bound, vec![0x02, 0x02, 0x1c, 0x00]);
    // NEW, value NEW + int tag + int, next null
    assert_eq!(erased, vec![0x02, 0x02, 0x02, 0x1c, 0x00]);

    // A reader must use the same declared type as the writer
    let decoded = engine.read_object(&erased, &Type::class(n.node)).unwrap();
    assert_eq!(decoded.field(0), Some(Value::Int(7)));
}
