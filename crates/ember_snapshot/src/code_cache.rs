//! The code cache front end: encode, decode and background decode.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ember_common::LineIndex;
use ember_config::EmberConfig;
use ember_heap::{
    fields, Heap, ObjRef, ReadOnlyError, ReadOnlySpace, Record, RecordKind, RootIndex, Runtime,
    ScriptId, Value,
};
use tracing::{debug, warn};

use crate::cached_data::CachedData;
use crate::deserializer::{DecodedGraph, ObjectDeserializer};
use crate::error::{DeserializeError, SanityCheckResult, SerializeError};
use crate::header;
use crate::hooks::{CompletionHook, DeserializeEvent, DeserializeMode, FunctionPosition, SerializeEvent};
use crate::off_thread::{BackgroundDeserializeTask, OffThreadDeserializeData, PendingDeserialize};
use crate::sanity::{self, source_hash, OriginOptions, RuntimeTags};
use crate::serializer::{find_uncacheable, CodeSerializer, ElisionPolicy};

/// Builds a runtime laid out as `config` describes.
pub fn bootstrap_runtime(config: &EmberConfig) -> Result<Runtime, ReadOnlyError> {
    let read_only = Arc::new(ReadOnlySpace::bootstrap(config.read_only.chunk_size)?);
    let heap = config.heap.limit_bytes.map_or_else(Heap::new, Heap::with_limit);
    Ok(Runtime::with_heap(read_only, heap))
}

/// Produces and consumes cache entries for one runtime configuration.
pub struct CodeCache {
    tags: RuntimeTags,
    elision: ElisionPolicy,
    hooks: Vec<Arc<dyn CompletionHook>>,
}

impl CodeCache {
    /// Creates a cache bound to `tags` with the default elision policy.
    pub fn new(tags: RuntimeTags) -> Self {
        Self {
            tags,
            elision: ElisionPolicy::default(),
            hooks: Vec::new(),
        }
    }

    /// Creates a cache bound to the tags derived from `config`.
    pub fn from_config(config: &EmberConfig) -> Self {
        Self::new(RuntimeTags::from_config(config))
    }

    /// Replaces the elision policy.
    pub fn with_elision(mut self, elision: ElisionPolicy) -> Self {
        self.elision = elision;
        self
    }

    /// Registers a completion hook.
    pub fn add_hook(&mut self, hook: Arc<dyn CompletionHook>) {
        self.hooks.push(hook);
    }

    /// Returns the tags entries are checked against.
    pub fn tags(&self) -> &RuntimeTags {
        &self.tags
    }

    /// Encodes the graph of the function `root`.
    ///
    /// The function's script must have a string source. The source is not
    /// written to the entry; the consumer supplies it again. The graph is
    /// left exactly as it was found, whether or not encoding succeeds.
    ///
    /// # Panics
    ///
    /// Panics if the graph reaches a record kind that can never be encoded
    /// (machine code, closures, contexts or maps).
    pub fn serialize(&self, runtime: &mut Runtime, root: ObjRef) -> Result<CachedData<'static>, SerializeError> {
        let start = Instant::now();
        let view = runtime.view();
        let is_function = view
            .record(root)
            .is_some_and(|record| record.kind == RecordKind::FunctionInfo);
        if !is_function {
            return Err(SerializeError::MissingScript);
        }
        let script = view.function_script(root).ok_or(SerializeError::MissingScript)?;
        let script_record = view.record(script).ok_or(SerializeError::MissingScript)?;
        let source = script_record
            .edge(fields::SOURCE)
            .ok_or(SerializeError::MissingScript)?;
        let source_text = view.string(source).ok_or(SerializeError::MissingScript)?;
        let origin = OriginOptions::from_flags(
            script_record
                .field(fields::ORIGIN_OPTIONS)
                .and_then(Value::as_int)
                .unwrap_or(0),
        );
        let hash = source_hash(source_text, origin);

        if let Some(kind) = find_uncacheable(&runtime.heap, root) {
            debug!(kind = kind.name(), "graph is not cacheable");
            return Err(SerializeError::NotCacheable { kind: kind.name() });
        }

        let read_only: &ReadOnlySpace = &runtime.read_only;
        let mut serializer = CodeSerializer::new(&mut runtime.heap, read_only, &self.elision);
        serializer.add_attached(source);
        serializer.serialize(root)?;
        let (payload, stats) = serializer.finish();
        let buffer = header::frame(&self.tags, hash, &payload)?;

        let elapsed = start.elapsed();
        debug!(
            bytes = buffer.len(),
            new_objects = stats.new_objects,
            hot_hits = stats.hot_hits,
            back_refs = stats.back_refs,
            elided = stats.elided,
            elapsed_us = elapsed.as_micros() as u64,
            "serialized code cache"
        );
        let event = SerializeEvent {
            bytes: buffer.len(),
            elapsed,
            stats,
        };
        for hook in &self.hooks {
            hook.on_serialized(&event);
        }
        Ok(CachedData::from_vec(buffer))
    }

    /// Checks `cached` against this build and `source`, then restores its
    /// graph into `runtime`.
    ///
    /// Nothing is added to the runtime unless the whole entry decodes. A
    /// rejected entry is marked on `cached`.
    pub fn deserialize(
        &self,
        runtime: &mut Runtime,
        cached: &CachedData<'_>,
        source: &str,
        origin: OriginOptions,
    ) -> Result<ObjRef, DeserializeError> {
        let start = Instant::now();
        let data = sanity::from_cached_data(cached, &self.tags, source_hash(source, origin))
            .map_err(rejected)?;

        let mut staging = Heap::with_limit(runtime.heap.remaining());
        let source_string = staging.allocate_string(source)?;
        let decoded = ObjectDeserializer::new(
            data.payload(),
            &mut staging,
            &runtime.read_only,
            vec![ObjRef::Heap(source_string)],
        )
        .deserialize()
        .inspect_err(|err| warn!(%err, "code cache decode failed"))?;

        let relocation = runtime.heap.absorb(staging)?;
        let decoded = decoded.relocate(relocation);
        let script_id = runtime.scripts.append(&mut runtime.heap, decoded.script);
        self.finalize(
            runtime,
            DeserializeMode::Sync,
            &decoded,
            script_id,
            cached.len(),
            start.elapsed(),
        );
        Ok(decoded.root)
    }

    /// Starts decoding `data` on a worker thread.
    ///
    /// The worker gets a private heap limited to the runtime heap's current
    /// free capacity and never touches `runtime`.
    pub fn start_background_deserialize(
        &self,
        runtime: &Runtime,
        data: Arc<CachedData<'static>>,
    ) -> std::io::Result<PendingDeserialize> {
        BackgroundDeserializeTask::new(
            self.tags,
            Arc::clone(&runtime.read_only),
            data,
            runtime.heap.remaining(),
        )
        .spawn()
    }

    /// Waits for a background decode and merges its result.
    pub fn finish_background_deserialize(
        &self,
        runtime: &mut Runtime,
        pending: PendingDeserialize,
        cached: &CachedData<'_>,
        source: &str,
        origin: OriginOptions,
    ) -> Result<ObjRef, DeserializeError> {
        let data = pending.join();
        self.finish_off_thread_deserialize(runtime, data, cached, source, origin)
    }

    /// Merges the result of [`start_deserialize_off_thread`](crate::start_deserialize_off_thread).
    ///
    /// Runs the source check on top of the worker's structural check, then
    /// moves the private heap into the runtime, installs `source` on the
    /// decoded script, registers the script and finalizes.
    pub fn finish_off_thread_deserialize(
        &self,
        runtime: &mut Runtime,
        data: OffThreadDeserializeData,
        cached: &CachedData<'_>,
        source: &str,
        origin: OriginOptions,
    ) -> Result<ObjRef, DeserializeError> {
        let start = Instant::now();
        sanity::from_partially_checked(cached, data.sanity_check_result, source_hash(source, origin))
            .map_err(rejected)?;
        let handles = match data.outcome {
            Some(outcome) => outcome.inspect_err(|err| warn!(%err, "background code cache decode failed"))?,
            None => return Err(rejected(data.sanity_check_result)),
        };

        let source_record = Record::string(source);
        runtime
            .heap
            .reserve(handles.heap().used_bytes() + source_record.size_in_bytes())?;
        let decoded = handles.reattach(&mut runtime.heap)?;

        let placeholder = Value::Ref(runtime.read_only.root(RootIndex::EmptyString));
        let source_string = runtime.heap.allocate(source_record)?;
        if let Some(script) = runtime.heap.get_mut(decoded.script) {
            let previous = script.set_field(fields::SOURCE, Value::Ref(ObjRef::Heap(source_string)));
            debug_assert_eq!(previous, Some(placeholder));
        }
        let script_id = runtime.scripts.append(&mut runtime.heap, decoded.script);
        self.finalize(
            runtime,
            DeserializeMode::OffThread,
            &decoded,
            script_id,
            cached.len(),
            data.elapsed + start.elapsed(),
        );
        Ok(decoded.root)
    }

    /// Indexes the restored script's lines, resolves function positions and
    /// fires hooks. Shared by both decode paths.
    fn finalize(
        &self,
        runtime: &mut Runtime,
        mode: DeserializeMode,
        decoded: &DecodedGraph,
        script_id: ScriptId,
        bytes: usize,
        elapsed: Duration,
    ) {
        let view = runtime.view();
        let line_index = view
            .record(ObjRef::Heap(decoded.script))
            .and_then(|script| script.edge(fields::SOURCE))
            .and_then(|source| view.string(source))
            .map(LineIndex::new);
        let functions: Vec<FunctionPosition> = decoded
            .functions
            .iter()
            .filter_map(|id| {
                let index = line_index.as_ref()?;
                let start = runtime.heap.get(*id)?.field(fields::START_POSITION)?.as_int()?;
                let (line, column) = index.line_col(u32::try_from(start).ok()?);
                Some(FunctionPosition {
                    function: ObjRef::Heap(*id),
                    line,
                    column,
                })
            })
            .collect();
        if let Some(index) = line_index {
            runtime.scripts.set_line_index(script_id, index);
        }

        debug!(
            ?mode,
            script_id = script_id.as_raw(),
            bytes,
            functions = functions.len(),
            elapsed_us = elapsed.as_micros() as u64,
            "deserialized code cache"
        );
        let event = DeserializeEvent {
            mode,
            script_id,
            bytes,
            elapsed,
            functions,
        };
        for hook in &self.hooks {
            hook.on_deserialized(&event);
        }
    }
}

fn rejected(result: SanityCheckResult) -> DeserializeError {
    warn!(reason = %result, code = result.code(), "rejected code cache");
    DeserializeError::Rejected(result)
}
