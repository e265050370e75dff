// ABOUTME: Integration tests for shared-reference and cycle preservation.
// ABOUTME: Covers round-trip identity, cycle topology, order stability and disabled tracking.

mod common;

use common::isomorphic;
use graphcodec::{ClassId, ClassShape, Engine, EngineConfig, Error, Registry, Type, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

struct People {
    registry: Arc<Registry>,
    person: ClassId,
    team: ClassId,
}

fn people() -> People {
    let mut registry = Registry::new();
    let person = registry
        .register(
            ClassShape::new("Person")
                .required_field("name", Type::Str)
                .field("best_friend", Type::Any)
                .field("tags", Type::list(Type::Str)),
        )
        .unwrap();
    let team = registry
        .register(
            ClassShape::new("Team")
                .field("lead", Type::class(person))
                .field("members", Type::list(Type::class(person)))
                .field("roles", Type::map(Type::class(person))),
        )
        .unwrap();
    People {
        registry: Arc::new(registry),
        person,
        team,
    }
}

fn person(p: &People, name: &str) -> Value {
    Value::object(p.person, vec![Value::from(name), Value::Null, Value::Null])
}

#[test]
fn test_shared_instance_decodes_once() {
    let p = people();
    let alice = person(&p, "alice");
    let bob = person(&p, "bob");
    let mut roles = BTreeMap::new();
    roles.insert("captain".to_owned(), alice.clone());
    roles.insert("keeper".to_owned(), bob.clone());
    let team = Value::object(
        p.team,
        vec![
            alice.clone(),
            Value::list(vec![alice.clone(), bob.clone()]),
            Value::map(roles),
        ],
    );

    let mut engine = Engine::new(Arc::clone(&p.registry));
    let bytes = engine.to_vec(&team, &Type::class(p.team)).unwrap();
    // team, alice, members list, bob, roles map
    assert_eq!(engine.references_assigned(), 5);

    let decoded = engine.read_object(&bytes, &Type::class(p.team)).unwrap();
    assert!(isomorphic(&team, &decoded));

    let lead = decoded.field(0).unwrap();
    let members = decoded.field(1).unwrap();
    let roles = decoded.field(2).unwrap();
    assert!(lead.same_instance(&members.get(0).unwrap()));
    assert!(lead.same_instance(&roles.get_key("captain").unwrap()));
    assert!(members.get(1).unwrap().same_instance(&roles.get_key("keeper").unwrap()));
    assert!(!lead.same_instance(&members.get(1).unwrap()));
}

#[test]
fn test_self_cycle() {
    let p = people();
    let narcissus = person(&p, "narcissus");
    narcissus.set_field(1, narcissus.clone());

    let mut engine = Engine::new(Arc::clone(&p.registry));
    let bytes = engine.to_vec(&narcissus, &Type::class(p.person)).unwrap();
    let decoded = engine.read_object(&bytes, &Type::class(p.person)).unwrap();

    assert_eq!(decoded.field(0), Some(Value::from("narcissus")));
    assert!(decoded.field(1).unwrap().same_instance(&decoded));
    assert!(isomorphic(&narcissus, &decoded));
}

#[test]
fn test_cycle_through_containers() {
    let p = people();
    let a = person(&p, "a");
    let b = person(&p, "b");
    // a -> [b] via a list held in a map, b -> a
    let mut inner = BTreeMap::new();
    inner.insert("next".to_owned(), Value::list(vec![b.clone()]));
    a.set_field(1, Value::map(inner));
    b.set_field(1, a.clone());

    let mut engine = Engine::new(Arc::clone(&p.registry));
    let bytes = engine.to_vec(&a, &Type::Any).unwrap();
    let decoded = engine.read_object(&bytes, &Type::Any).unwrap();

    assert!(isomorphic(&a, &decoded));
    let b2 = decoded
        .field(1)
        .and_then(|m| m.get_key("next"))
        .and_then(|l| l.get(0))
        .unwrap();
    assert!(b2.field(1).unwrap().same_instance(&decoded));
}

#[test]
fn test_long_chain_with_back_edge() {
    let p = people();
    let head = person(&p, "0");
    let mut tail = head.clone();
    for i in 1..100 {
        let next = person(&p, &i.to_string());
        tail.set_field(1, next.clone());
        tail = next;
    }
    tail.set_field(1, head.clone());

    let mut engine = Engine::new(Arc::clone(&p.registry));
    let bytes = engine.to_vec(&head, &Type::class(p.person)).unwrap();
    assert_eq!(engine.references_assigned(), 100);
    let decoded = engine.read_object(&bytes, &Type::class(p.person)).unwrap();
    assert!(isomorphic(&head, &decoded));
}

#[test]
fn test_equal_graphs_encode_identically() {
    let p = people();
    let build = || {
        let alice = person(&p, "alice");
        alice.set_field(2, Value::list(vec![Value::from("x"), Value::from("y")]));
        let bob = person(&p, "bob");
        bob.set_field(1, alice.clone());
        alice.set_field(1, bob.clone());
        Value::object(
            p.team,
            vec![bob.clone(), Value::list(vec![alice, bob]), Value::Null],
        )
    };

    let mut engine = Engine::new(Arc::clone(&p.registry));
    let first = engine.to_vec(&build(), &Type::class(p.team)).unwrap();
    let second = engine.to_vec(&build(), &Type::class(p.team)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_strings_are_not_tracked() {
    let p = people();
    let name = Value::from("same");
    let list = Value::list(vec![name.clone(), name.clone()]);

    let mut engine = Engine::new(Arc::clone(&p.registry));
    let bytes = engine.to_vec(&list, &Type::list(Type::Str)).unwrap();
    // Only the list itself gets an id
    assert_eq!(engine.references_assigned(), 1);
    // NEW, len 2, then NEW + "same" twice
    assert_eq!(bytes.len(), 2 + 2 * (1 + 1 + 4));
}

#[test]
fn test_references_disabled_duplicates_shared_values() {
    let p = people();
    let alice = person(&p, "alice");
    let list = Value::list(vec![alice.clone(), alice]);
    let config = EngineConfig {
        references: false,
        ..EngineConfig::default()
    };

    let mut engine = Engine::with_config(Arc::clone(&p.registry), config);
    let ty = Type::list(Type::class(p.person));
    let bytes = engine.to_vec(&list, &ty).unwrap();
    assert_eq!(engine.references_assigned(), 0);

    let decoded = engine.read_object(&bytes, &ty).unwrap();
    let (first, second) = (decoded.get(0).unwrap(), decoded.get(1).unwrap());
    assert!(!first.same_instance(&second));
    assert_eq!(first.field(0), second.field(0));

    // Back-reference markers are invalid when tracking is off
    assert_eq!(
        engine.read_object(&[0x02, 0x02, 0x04], &Type::list(Type::Any)),
        Err(Error::InvalidMarker(2))
    );
}

#[test]
fn test_cycle_without_tracking_hits_depth_limit() {
    let p = people();
    let loop_ = person(&p, "loop");
    loop_.set_field(1, loop_.clone());
    let config = EngineConfig {
        references: false,
        max_depth: 64,
        ..EngineConfig::default()
    };

    let mut engine = Engine::with_config(Arc::clone(&p.registry), config);
    let mut out = Vec::new();
    assert_eq!(
        engine.write_object(&mut out, &loop_, &Type::class(p.person)),
        Err(Error::MaxDepthExceeded)
    );
    assert!(out.is_empty());
}
