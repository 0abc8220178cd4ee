//! Create/open reconciliation through the makers.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{edit_catalog, is_wrong_configuration, test_db, UpperCaseSerializer};
use tessdb_catalog::serializers::CUSTOM_SERIALIZER;
use tessdb_catalog::{
    validate, CatalogError, CollectionType, CreateMode, LiveObject, Serializer, SerializerId,
    Value,
};

#[test]
fn test_repeated_lookup_returns_same_instance() {
    let db = test_db();
    let created = db.hash_map("users").create().unwrap();
    let opened = db.hash_map("users").open().unwrap();
    let either = db.hash_map("users").create_or_open().unwrap();

    assert!(Arc::ptr_eq(&created, &opened));
    assert!(Arc::ptr_eq(&created, &either));
    assert_eq!(db.instance_cache().len(), 1);
}

#[test]
fn test_create_modes_are_exclusive() {
    let db = test_db();
    assert!(is_wrong_configuration(db.tree_set("missing").open()));
    assert!(!db.exists("missing").unwrap());

    db.tree_set("present").create().unwrap();
    assert!(is_wrong_configuration(db.tree_set("present").create()));
    assert!(db
        .tree_set("present")
        .make(CreateMode::CreateOrOpen)
        .is_ok());
}

#[test]
fn test_type_mismatch_is_rejected() {
    let db = test_db();
    db.atomic_long("counter").create().unwrap();

    let err = db.hash_map("counter").create_or_open().unwrap_err();
    match err {
        CatalogError::WrongConfiguration(msg) => assert!(msg.contains("type mismatch")),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(is_wrong_configuration(db.atomic_integer("counter").open()));
    assert_eq!(db.get_type("counter").unwrap().as_deref(), Some("AtomicLong"));
}

#[test]
fn test_invalid_names_are_rejected() {
    let db = test_db();
    assert!(is_wrong_configuration(db.atomic_long("bad#name").create()));
    assert!(is_wrong_configuration(db.atomic_long("").create()));
    assert!(db.all_names().unwrap().is_empty());
}

/// Creates one collection of every type and returns the name of each.
fn create_every_type(db: &tessdb_catalog::Db) -> Vec<(&'static str, CollectionType)> {
    let ttl = Duration::from_secs(60);
    db.hash_map("hm")
        .counter_enable()
        .expire_after_create(ttl)
        .expire_after_update(ttl)
        .expire_after_get(ttl)
        .create()
        .unwrap();
    db.hash_set("hs")
        .expire_after_create(ttl)
        .expire_after_get(ttl)
        .create()
        .unwrap();
    db.tree_map("tm").counter_enable().create().unwrap();
    db.tree_set("ts").create().unwrap();
    db.atomic_boolean("ab").init(true).create().unwrap();
    db.atomic_integer("ai").init(7).create().unwrap();
    db.atomic_long("al").init(9i64).create().unwrap();
    db.atomic_string("as").init("hello").create().unwrap();
    db.atomic_var("av").init(Value::from("x")).create().unwrap();
    db.index_tree_list("il").create().unwrap();
    db.index_tree_long_long_map("im").create().unwrap();

    vec![
        ("hm", CollectionType::HashMap),
        ("hs", CollectionType::HashSet),
        ("tm", CollectionType::TreeMap),
        ("ts", CollectionType::TreeSet),
        ("ab", CollectionType::AtomicBoolean),
        ("ai", CollectionType::AtomicInteger),
        ("al", CollectionType::AtomicLong),
        ("as", CollectionType::AtomicString),
        ("av", CollectionType::AtomicVar),
        ("il", CollectionType::IndexTreeList),
        ("im", CollectionType::IndexTreeLongLongMap),
    ]
}

#[test]
fn test_every_type_creates_a_valid_catalog() {
    let db = test_db();
    let created = create_every_type(&db);

    assert_eq!(created.len(), CollectionType::ALL.len());
    assert_eq!(db.all_names().unwrap().len(), CollectionType::ALL.len());
    assert_eq!(db.verify_catalog().unwrap(), Vec::<String>::new());

    let params = db.params_for("hm").unwrap();
    for queue in ["expireCreateQueue", "expireUpdateQueue", "expireGetQueue"] {
        assert!(params.contains_key(queue), "hm lacks {}", queue);
    }

    for (name, ty) in created {
        let tag = db.get_type(name).unwrap().unwrap();
        assert_eq!(CollectionType::from_tag(&tag), Some(ty), "{} has tag {}", name, tag);
    }
}

#[test]
fn test_every_missing_required_parameter_is_reported() {
    let db = test_db();
    let created = create_every_type(&db);
    let catalog = db.name_catalog().unwrap();

    for (name, ty) in created {
        for param in ty.params().iter().filter(|p| p.required) {
            let key = format!("{}#{}", name, param.key);
            let mut damaged = catalog.clone();
            assert!(damaged.remove(&key).is_some(), "{} was not written", key);
            let problems = validate(&damaged);
            assert!(
                problems.iter().any(|p| p.contains(&key)),
                "no problem names {}: {:?}",
                key,
                problems
            );
        }
    }
}

#[test]
fn test_atomic_initial_values() {
    let db = test_db();
    assert_eq!(db.atomic_integer("i").init(7).create().unwrap().get().unwrap(), 7);
    assert_eq!(db.atomic_long("l").create().unwrap().get().unwrap(), 0);
    assert!(db.atomic_boolean("b").init(true).create().unwrap().get().unwrap());
    assert_eq!(
        db.atomic_string("s").init("abc").create().unwrap().get().unwrap(),
        "abc"
    );
    assert_eq!(
        db.atomic_var("v").create().unwrap().get().unwrap(),
        Value::Null
    );
}

#[test]
fn test_hash_map_parameters_are_recorded() {
    let db = test_db();
    let map = db
        .hash_map("sessions")
        .concurrency(2)
        .hash_seed(42)
        .key_serializer(db.serializers().get(SerializerId::String))
        .create()
        .unwrap();
    assert_eq!(map.segment_count(), 2);

    let params = db.params_for("sessions").unwrap();
    assert_eq!(params.get("concShift").map(String::as_str), Some("1"));
    assert_eq!(params.get("hashSeed").map(String::as_str), Some("42"));
    assert_eq!(params.get("keySerializer").map(String::as_str), Some("String"));
    assert_eq!(params.get("valueSerializer").map(String::as_str), Some("Generic"));
    assert!(!params.contains_key("counterRecids"));
    assert!(!params.contains_key("expireCreateQueue"));
}

#[test]
fn test_invalid_hash_options() {
    let db = test_db();
    assert!(is_wrong_configuration(
        db.hash_map("m").expire_max_size(10).create()
    ));
    assert!(is_wrong_configuration(
        db.hash_map("m").layout(8, 128, 8).create()
    ));
    assert!(!db.exists("m").unwrap());
}

#[test]
fn test_extreme_layouts_are_configuration_errors() {
    let db = test_db();
    assert!(is_wrong_configuration(
        db.hash_map("m").layout(8, 128, u32::MAX).create()
    ));
    assert!(is_wrong_configuration(
        db.hash_map("m").concurrency(u32::MAX).create()
    ));
    assert!(is_wrong_configuration(
        db.hash_set("s").layout(u32::MAX, u32::MAX, 1).create()
    ));
    assert!(is_wrong_configuration(
        db.index_tree_list("l").layout(7, u32::MAX).create()
    ));
    assert!(is_wrong_configuration(
        db.index_tree_long_long_map("ll").layout(7, u32::MAX).create()
    ));
    assert!(db.all_names().unwrap().is_empty());
}

#[test]
fn test_supplied_serializer_must_match_catalog() {
    let db = test_db();
    db.hash_set("tags")
        .serializer(db.serializers().get(SerializerId::String))
        .create()
        .unwrap();
    db.evict("tags");

    let wrong = db
        .hash_set("tags")
        .serializer(db.serializers().get(SerializerId::Long))
        .open();
    assert!(is_wrong_configuration(wrong));

    let set = db.hash_set("tags").open().unwrap();
    assert_eq!(set.serializer().singleton_id(), Some(SerializerId::String));
}

#[test]
fn test_custom_serializer_must_be_resupplied() {
    let db = test_db();
    let custom: Arc<dyn Serializer> = Arc::new(UpperCaseSerializer);
    db.hash_set("names").serializer(Arc::clone(&custom)).create().unwrap();

    let params = db.params_for("names").unwrap();
    assert_eq!(params.get("serializer").map(String::as_str), Some(CUSTOM_SERIALIZER));

    db.evict("names");
    assert!(is_wrong_configuration(db.hash_set("names").open()));
    let set = db.hash_set("names").serializer(custom).open().unwrap();
    assert!(set.serializer().singleton_id().is_none());
}

#[test]
fn test_generic_serializer_of_another_db_is_not_a_singleton() {
    let db = test_db();
    let other = test_db();

    db.hash_map("borrowed")
        .value_serializer(other.default_serializer())
        .create()
        .unwrap();
    let params = db.params_for("borrowed").unwrap();
    assert_eq!(
        params.get("valueSerializer").map(String::as_str),
        Some(CUSTOM_SERIALIZER)
    );

    db.hash_map("own").create().unwrap();
    assert_eq!(
        db.params_for("own").unwrap().get("valueSerializer").map(String::as_str),
        Some("Generic")
    );
    db.evict("own");
    assert!(is_wrong_configuration(
        db.hash_map("own")
            .value_serializer(other.default_serializer())
            .open()
    ));
    assert!(db
        .hash_map("own")
        .value_serializer(db.default_serializer())
        .open()
        .is_ok());
}

#[test]
fn test_tree_bulk_load() {
    let db = test_db();
    let map = db
        .tree_map("scores")
        .max_node_size(4)
        .counter_enable()
        .bulk_load((0..20i64).map(|i| (Value::from(i), Value::from(i * 10))))
        .create()
        .unwrap();

    assert_eq!(map.len().unwrap(), 20);
    assert_eq!(map.get(&Value::from(13i64)).unwrap(), Some(Value::from(130i64)));
    assert_eq!(map.get(&Value::from(99i64)).unwrap(), None);
    assert_eq!(map.keys().unwrap().first(), Some(&Value::from(0i64)));

    db.evict("scores");
    assert!(is_wrong_configuration(
        db.tree_map("scores")
            .bulk_load(vec![(Value::from(1i64), Value::from(1i64))])
            .open()
    ));
}

#[test]
fn test_unsorted_bulk_load_leaves_no_entry() {
    let db = test_db();
    let result = db
        .tree_set("letters")
        .bulk_load(vec![Value::from("b"), Value::from("a")])
        .create();
    assert!(is_wrong_configuration(result));
    assert!(!db.exists("letters").unwrap());
}

#[test]
fn test_tree_rejects_small_nodes() {
    let db = test_db();
    assert!(is_wrong_configuration(db.tree_map("t").max_node_size(2).create()));
}

#[test]
fn test_get_dispatches_on_type() {
    let db = test_db();
    let list = db.index_tree_list("queue").create().unwrap();
    db.atomic_string("label").create().unwrap();

    match db.get("queue").unwrap() {
        Some(LiveObject::IndexTreeList(found)) => assert!(Arc::ptr_eq(&found, &list)),
        other => panic!("unexpected {:?}", other.map(|o| o.collection_type())),
    }
    assert_eq!(
        db.get("label").unwrap().map(|o| o.collection_type()),
        Some(CollectionType::AtomicString)
    );
    assert!(db.get("nothing").unwrap().is_none());
}

#[test]
fn test_get_unknown_type_tag() {
    let db = test_db();
    edit_catalog(db.store().as_ref(), |catalog| {
        catalog.insert("odd#type", "Bogus");
    });
    assert!(matches!(
        db.get("odd"),
        Err(CatalogError::NewFormatUnsupported(_))
    ));
}

#[test]
fn test_evict_rebuilds_instance() {
    let db = test_db();
    let first = db.atomic_long("n").create().unwrap();
    first.set(5).unwrap();

    assert!(db.evict("n"));
    assert!(!db.evict("n"));
    let second = db.atomic_long("n").open().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.get().unwrap(), 5);
}

#[test]
fn test_evict_unused_keeps_held_objects() {
    let db = test_db();
    let held = db.atomic_long("held").create().unwrap();
    db.atomic_long("dropped").create().unwrap();

    assert_eq!(db.instance_cache().evict_unused(), 1);
    assert_eq!(db.instance_cache().len(), 1);
    assert!(Arc::ptr_eq(&held, &db.atomic_long("held").open().unwrap()));
}

#[test]
fn test_concurrent_create_or_open_shares_instance() {
    let db = test_db();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || db.hash_map("shared").create_or_open().unwrap())
        })
        .collect();

    let maps: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for map in &maps[1..] {
        assert!(Arc::ptr_eq(&maps[0], map));
    }
    assert_eq!(db.all_names().unwrap(), vec!["shared".to_string()]);
}
