//! Integration tests for encoder behavior: reference deduplication,
//! uncacheable graphs, elision and input validation.

mod common;

use common::{
    build_program, new_function, new_script, record, record_mut, recording_hook, runtime, SOURCE,
};
use ember_heap::{fields, ObjRef, Record, RecordKind, Runtime, Value};
use ember_snapshot::{
    CachedData, CodeCache, ElisionPolicy, OriginOptions, SerializeError, SerializeStats,
    MAX_GRAPH_DEPTH,
};

fn cache() -> CodeCache {
    CodeCache::from_config(&common::config())
}

fn snapshot(runtime: &Runtime) -> Vec<Record> {
    runtime.heap.iter().map(|(_, record)| record.clone()).collect()
}

/// Restores `cached` into a fresh runtime and returns the root function's
/// literal table.
fn restored_literals(cache: &CodeCache, cached: &CachedData<'_>) -> (Runtime, Record) {
    let mut consumer = runtime();
    let root = cache
        .deserialize(&mut consumer, cached, SOURCE, OriginOptions::script())
        .unwrap();
    let bytecode = record(&consumer, root).edge(fields::FUNCTION_DATA).unwrap();
    let literals = record(&consumer, bytecode).edge(fields::LITERALS).unwrap();
    let table = record(&consumer, literals);
    (consumer, table)
}

// ---------------------------------------------------------------------------
// Hot object cache
// ---------------------------------------------------------------------------

/// Encodes a single function whose literal table holds `count` references
/// to one string, returning the encoder statistics.
fn stats_for_repeated_literal(count: usize) -> SerializeStats {
    let mut producer = runtime();
    let script = new_script(&mut producer, SOURCE, OriginOptions::script());
    let shared = producer.allocate(Record::string("shared")).unwrap();
    let table = (0..count).fold(Record::new(RecordKind::LiteralTable), |table, i| {
        table.with_field(&i.to_string(), Value::Ref(shared))
    });
    let literals = producer.allocate(table).unwrap();
    let root = new_function(&mut producer, script, "f", 0, literals);

    let mut cache = cache();
    let hook = recording_hook();
    cache.add_hook(hook.clone());
    cache.serialize(&mut producer, root).unwrap();
    let events = hook.serialized.lock().unwrap();
    events[0].stats
}

#[test]
fn repeated_references_hit_the_hot_cache() {
    let once = stats_for_repeated_literal(1);
    let five = stats_for_repeated_literal(5);

    assert_eq!(five.new_objects, once.new_objects);
    assert_eq!(five.hot_hits - once.hot_hits, 4);
    assert_eq!(five.back_refs, once.back_refs);
    // Each extra slot costs a one-byte name length, a one-byte name and a
    // one-byte hot reference.
    assert_eq!(five.payload_bytes - once.payload_bytes, 12);
}

#[test]
fn shared_records_are_shared_after_restore() {
    let mut producer = runtime();
    let script = new_script(&mut producer, SOURCE, OriginOptions::script());
    let shared = producer.allocate(Record::string("shared")).unwrap();
    let literals = producer
        .allocate(
            Record::new(RecordKind::LiteralTable)
                .with_field("0", Value::Ref(shared))
                .with_field("1", Value::Ref(shared)),
        )
        .unwrap();
    let root = new_function(&mut producer, script, "f", 0, literals);

    let cache = cache();
    let cached = cache.serialize(&mut producer, root).unwrap();
    let (consumer, table) = restored_literals(&cache, &cached);
    let first = table.edge("0").unwrap();
    assert_eq!(table.edge("1"), Some(first));
    assert_eq!(consumer.view().string(first), Some("shared"));
}

// ---------------------------------------------------------------------------
// Graphs that cannot be cached
// ---------------------------------------------------------------------------

#[test]
fn embedded_module_makes_graph_uncacheable() {
    let mut producer = runtime();
    let program = build_program(&mut producer, SOURCE, OriginOptions::script());
    let module = producer.allocate(Record::new(RecordKind::EmbeddedModule)).unwrap();
    record_mut(&mut producer, program.literals).set_field("3", Value::Ref(module));
    let before = snapshot(&producer);

    let mut cache = cache();
    let hook = recording_hook();
    cache.add_hook(hook.clone());
    let err = cache.serialize(&mut producer, program.root).unwrap_err();

    assert!(matches!(err, SerializeError::NotCacheable { kind: "embedded-module" }));
    assert_eq!(snapshot(&producer), before);
    assert!(hook.serialized.lock().unwrap().is_empty());
}

#[test]
#[should_panic(expected = "machine-code records must be pruned before encoding")]
fn machine_code_in_graph_panics() {
    let mut producer = runtime();
    let program = build_program(&mut producer, SOURCE, OriginOptions::script());
    let code = producer.allocate(Record::new(RecordKind::MachineCode)).unwrap();
    record_mut(&mut producer, program.literals).set_field("3", Value::Ref(code));
    let _ = cache().serialize(&mut producer, program.root);
}

#[test]
fn script_without_source_is_rejected() {
    let mut producer = runtime();
    let program = build_program(&mut producer, SOURCE, OriginOptions::script());
    record_mut(&mut producer, program.script).set_field(fields::SOURCE, Value::Undefined);
    let err = cache().serialize(&mut producer, program.root).unwrap_err();
    assert!(matches!(err, SerializeError::MissingScript));
}

#[test]
fn function_without_script_is_rejected() {
    let mut producer = runtime();
    let program = build_program(&mut producer, SOURCE, OriginOptions::script());
    record_mut(&mut producer, program.root)
        .set_field(fields::SCRIPT_OR_DEBUG_INFO, Value::Undefined);
    let err = cache().serialize(&mut producer, program.root).unwrap_err();
    assert!(matches!(err, SerializeError::MissingScript));
}

#[test]
fn overly_deep_graph_is_rejected() {
    let mut producer = runtime();
    let program = build_program(&mut producer, SOURCE, OriginOptions::script());
    let mut next = Value::Int(0);
    for _ in 0..MAX_GRAPH_DEPTH + 8 {
        let link = producer
            .allocate(Record::new(RecordKind::LiteralTable).with_field("next", next))
            .unwrap();
        next = Value::Ref(link);
    }
    record_mut(&mut producer, program.literals).set_field("3", next);
    let before = snapshot(&producer);

    let err = cache().serialize(&mut producer, program.root).unwrap_err();
    assert!(matches!(err, SerializeError::GraphTooDeep { limit } if limit == MAX_GRAPH_DEPTH));
    assert_eq!(snapshot(&producer), before);
}

// ---------------------------------------------------------------------------
// Elision
// ---------------------------------------------------------------------------

fn program_with_debug_dictionary(producer: &mut Runtime) -> ObjRef {
    let program = build_program(producer, SOURCE, OriginOptions::script());
    let dictionary = producer
        .allocate(Record::new(RecordKind::DebugDictionary).with_field("7", Value::Bool(true)))
        .unwrap();
    record_mut(producer, program.literals).set_field("3", Value::Ref(dictionary));
    program.root
}

#[test]
fn debug_dictionaries_are_elided_by_default() {
    let mut producer = runtime();
    let root = program_with_debug_dictionary(&mut producer);
    let mut cache = cache();
    let hook = recording_hook();
    cache.add_hook(hook.clone());
    let cached = cache.serialize(&mut producer, root).unwrap();
    assert_eq!(hook.serialized.lock().unwrap()[0].stats.elided, 1);

    let (_, table) = restored_literals(&cache, &cached);
    assert_eq!(table.field("3"), Some(&Value::Undefined));
    assert_eq!(table.field("2"), Some(&Value::Int(-7)));
}

#[test]
fn elision_can_be_disabled() {
    let mut producer = runtime();
    let root = program_with_debug_dictionary(&mut producer);
    let cache = cache().with_elision(ElisionPolicy::none());
    let cached = cache.serialize(&mut producer, root).unwrap();

    let (consumer, table) = restored_literals(&cache, &cached);
    let dictionary = record(&consumer, table.edge("3").unwrap());
    assert_eq!(dictionary.kind, RecordKind::DebugDictionary);
    assert_eq!(dictionary.field("7"), Some(&Value::Bool(true)));
}

#[test]
fn custom_elision_policy_applies() {
    let mut producer = runtime();
    let program = build_program(&mut producer, SOURCE, OriginOptions::script());
    let positions = producer
        .allocate(Record::new(RecordKind::ByteArray).with_field("bytes", Value::Bytes(vec![1, 2, 3])))
        .unwrap();
    record_mut(&mut producer, program.literals).set_field("3", Value::Ref(positions));

    let cache = cache().with_elision(ElisionPolicy::new(|record| {
        record.kind == RecordKind::ByteArray
    }));
    let cached = cache.serialize(&mut producer, program.root).unwrap();
    let (_, table) = restored_literals(&cache, &cached);
    assert_eq!(table.field("3"), Some(&Value::Undefined));
}
