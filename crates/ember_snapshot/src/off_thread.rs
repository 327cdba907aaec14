//! Decoding on a worker thread.
//!
//! [`start_deserialize_off_thread`] runs the structural check and decodes
//! into a private heap without touching any runtime state. The result is
//! handed back to the controlling thread, which merges it with
//! [`CodeCache::finish_off_thread_deserialize`](crate::CodeCache::finish_off_thread_deserialize)
//! once the source text is known.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ember_heap::{AllocationError, Heap, ObjRef, ReadOnlySpace, RootIndex};
use tracing::debug;

use crate::cached_data::CachedData;
use crate::deserializer::{DecodedGraph, ObjectDeserializer};
use crate::error::{DeserializeError, SanityCheckResult};
use crate::sanity::{self, RuntimeTags};

/// Name of background decode threads.
const THREAD_NAME: &str = "ember-deserialize";

/// A decoded graph in a private heap, pending transfer to a runtime.
#[derive(Debug)]
pub struct PersistentHandles {
    heap: Heap,
    graph: DecodedGraph,
}

impl PersistentHandles {
    /// Returns the private heap.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Returns the decoded root in the private heap's ID space.
    pub fn root(&self) -> ObjRef {
        self.graph.root
    }

    /// Moves the private heap into `target`, returning the graph in
    /// `target`'s ID space.
    pub(crate) fn reattach(self, target: &mut Heap) -> Result<DecodedGraph, AllocationError> {
        let relocation = target.absorb(self.heap)?;
        Ok(self.graph.relocate(relocation))
    }
}

/// Everything a background decode produced.
#[derive(Debug)]
pub struct OffThreadDeserializeData {
    pub(crate) sanity_check_result: SanityCheckResult,
    pub(crate) outcome: Option<Result<PersistentHandles, DeserializeError>>,
    pub(crate) elapsed: Duration,
}

impl OffThreadDeserializeData {
    /// Returns the structural check result recorded by the worker.
    pub fn sanity_check_result(&self) -> SanityCheckResult {
        self.sanity_check_result
    }

    /// Returns the decoded graph, if decoding ran and succeeded.
    pub fn handles(&self) -> Option<&PersistentHandles> {
        match &self.outcome {
            Some(Ok(handles)) => Some(handles),
            _ => None,
        }
    }

    /// Returns the time the worker spent.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Checks and decodes `cached` without a runtime or source text.
///
/// Script sources are bound to the empty string root as a placeholder.
/// Decoding stops at the first failure; the failure is kept for the
/// controlling thread to report.
pub fn start_deserialize_off_thread(
    tags: &RuntimeTags,
    read_only: &ReadOnlySpace,
    cached: &CachedData<'_>,
    heap_limit: usize,
) -> OffThreadDeserializeData {
    let start = Instant::now();
    let data = match sanity::from_cached_data_without_source(cached, tags) {
        Ok(data) => data,
        Err(result) => {
            debug!(code = result.code(), "background code cache check failed");
            return OffThreadDeserializeData {
                sanity_check_result: result,
                outcome: None,
                elapsed: start.elapsed(),
            };
        }
    };

    let mut heap = Heap::with_limit(heap_limit);
    let placeholder = read_only.root(RootIndex::EmptyString);
    let decoded =
        ObjectDeserializer::new(data.payload(), &mut heap, read_only, vec![placeholder]).deserialize();
    let outcome = decoded.map(|graph| PersistentHandles { heap, graph });
    let elapsed = start.elapsed();
    debug!(
        bytes = cached.len(),
        elapsed_us = elapsed.as_micros() as u64,
        ok = outcome.is_ok(),
        "background code cache decode finished"
    );
    OffThreadDeserializeData {
        sanity_check_result: SanityCheckResult::Success,
        outcome: Some(outcome),
        elapsed,
    }
}

/// Inputs of one background decode.
pub struct BackgroundDeserializeTask {
    tags: RuntimeTags,
    read_only: Arc<ReadOnlySpace>,
    data: Arc<CachedData<'static>>,
    heap_limit: usize,
}

impl BackgroundDeserializeTask {
    /// Creates a task decoding `data` into a heap of at most `heap_limit` bytes.
    pub fn new(
        tags: RuntimeTags,
        read_only: Arc<ReadOnlySpace>,
        data: Arc<CachedData<'static>>,
        heap_limit: usize,
    ) -> Self {
        Self {
            tags,
            read_only,
            data,
            heap_limit,
        }
    }

    /// Runs the task on the calling thread.
    pub fn run(&self) -> OffThreadDeserializeData {
        start_deserialize_off_thread(&self.tags, &self.read_only, &self.data, self.heap_limit)
    }

    /// Runs the task on a new thread.
    pub fn spawn(self) -> std::io::Result<PendingDeserialize> {
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || self.run())?;
        Ok(PendingDeserialize {
            handle: Some(handle),
        })
    }
}

/// A background decode in flight.
///
/// Dropping it without calling [`PendingDeserialize::join`] still waits for
/// the worker; the thread is never detached.
pub struct PendingDeserialize {
    handle: Option<JoinHandle<OffThreadDeserializeData>>,
}

impl PendingDeserialize {
    /// Returns `true` once the worker has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the worker and returns its result.
    ///
    /// A panic on the worker is resumed on the calling thread.
    pub fn join(mut self) -> OffThreadDeserializeData {
        let Some(handle) = self.handle.take() else {
            return OffThreadDeserializeData {
                sanity_check_result: SanityCheckResult::Success,
                outcome: Some(Err(DeserializeError::malformed("background decode already joined"))),
                elapsed: Duration::ZERO,
            };
        };
        match handle.join() {
            Ok(data) => data,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

impl Drop for PendingDeserialize {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
