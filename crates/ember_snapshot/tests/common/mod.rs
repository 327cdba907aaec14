//! Graph builders and hooks shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use ember_config::EmberConfig;
use ember_heap::{fields, ObjRef, Record, RecordKind, RootIndex, Runtime, Value};
use ember_snapshot::{
    bootstrap_runtime, CompletionHook, DeserializeEvent, OriginOptions, SerializeEvent,
};

/// Source text of the sample program. `inner` starts at byte 21.
pub const SOURCE: &str = "function outer() {\n  function inner() {}\n  return inner;\n}\n";

/// Byte offset of `inner` in [`SOURCE`].
pub const INNER_START: i64 = 21;

pub fn config() -> EmberConfig {
    let mut config = EmberConfig::for_version("12.1.0");
    config.runtime.flags = vec!["--lazy".to_string(), "--no-opt".to_string()];
    config.read_only.chunk_size = 4096;
    config
}

pub fn runtime() -> Runtime {
    bootstrap_runtime(&config()).unwrap()
}

/// Handles into a sample program.
pub struct Program {
    pub root: ObjRef,
    pub inner: ObjRef,
    pub script: ObjRef,
    pub literals: ObjRef,
}

pub fn new_script(runtime: &mut Runtime, source: &str, origin: OriginOptions) -> ObjRef {
    let empty_literals = runtime.read_only.root(RootIndex::EmptyLiteralTable);
    let source = runtime.allocate(Record::string(source)).unwrap();
    let name = runtime.allocate(Record::string("app.js")).unwrap();
    runtime
        .allocate(
            Record::new(RecordKind::Script)
                .with_field(fields::SOURCE, Value::Ref(source))
                .with_field(fields::SCRIPT_NAME, Value::Ref(name))
                .with_field(fields::ID, Value::Int(0))
                .with_field(fields::ORIGIN_OPTIONS, Value::Int(origin.to_flags()))
                .with_field(fields::CONTEXT_DATA, Value::Undefined)
                .with_field(fields::HOST_DEFINED_OPTIONS, Value::Ref(empty_literals)),
        )
        .unwrap()
}

pub fn new_function(
    runtime: &mut Runtime,
    script: ObjRef,
    name: &str,
    start: i64,
    literals: ObjRef,
) -> ObjRef {
    let scope_info = runtime.read_only.root(RootIndex::EmptyScopeInfo);
    let name = runtime.allocate(Record::string(name)).unwrap();
    let bytecode = runtime
        .allocate(
            Record::new(RecordKind::Bytecode)
                .with_field(fields::CODE, Value::Bytes(vec![0x0b, 0x2a, 0xab, 0x00]))
                .with_field(fields::LITERALS, Value::Ref(literals)),
        )
        .unwrap();
    runtime
        .allocate(
            Record::new(RecordKind::FunctionInfo)
                .with_field(fields::NAME, Value::Ref(name))
                .with_field(fields::SCRIPT_OR_DEBUG_INFO, Value::Ref(script))
                .with_field(fields::FUNCTION_DATA, Value::Ref(bytecode))
                .with_field(fields::START_POSITION, Value::Int(start))
                .with_field(fields::END_POSITION, Value::Int(start + 20))
                .with_field(fields::SCOPE_INFO, Value::Ref(scope_info)),
        )
        .unwrap()
}

/// Builds `outer` with a nested `inner`. The script lists both functions,
/// so the graph is cyclic.
pub fn build_program(runtime: &mut Runtime, source: &str, origin: OriginOptions) -> Program {
    let script = new_script(runtime, source, origin);
    let empty_literals = runtime.read_only.root(RootIndex::EmptyLiteralTable);
    let inner = new_function(runtime, script, "inner", INNER_START, empty_literals);
    let builtin = runtime.read_only.builtin_string("length").unwrap();
    let literals = runtime
        .allocate(
            Record::new(RecordKind::LiteralTable)
                .with_field("0", Value::Ref(inner))
                .with_field("1", Value::Ref(builtin))
                .with_field("2", Value::Int(-7)),
        )
        .unwrap();
    let root = new_function(runtime, script, "outer", 0, literals);
    let functions = runtime
        .allocate(
            Record::new(RecordKind::LiteralTable)
                .with_field("0", Value::Ref(root))
                .with_field("1", Value::Ref(inner)),
        )
        .unwrap();
    record_mut(runtime, script).set_field(fields::SHARED_FUNCTION_INFOS, Value::Ref(functions));
    Program {
        root,
        inner,
        script,
        literals,
    }
}

pub fn record_mut(runtime: &mut Runtime, obj: ObjRef) -> &mut Record {
    runtime.heap.get_mut(obj.heap_id().unwrap()).unwrap()
}

pub fn record(runtime: &Runtime, obj: ObjRef) -> Record {
    runtime.record(obj).unwrap().clone()
}

/// Hook that stores every event it receives.
#[derive(Default)]
pub struct RecordingHook {
    pub deserialized: Mutex<Vec<DeserializeEvent>>,
    pub serialized: Mutex<Vec<SerializeEvent>>,
}

impl CompletionHook for RecordingHook {
    fn on_deserialized(&self, event: &DeserializeEvent) {
        self.deserialized.lock().unwrap().push(event.clone());
    }

    fn on_serialized(&self, event: &SerializeEvent) {
        self.serialized.lock().unwrap().push(event.clone());
    }
}

pub fn recording_hook() -> Arc<RecordingHook> {
    Arc::new(RecordingHook::default())
}
