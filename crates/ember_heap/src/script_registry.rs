//! Registry of the scripts known to a runtime.

use ember_common::LineIndex;

use crate::fields;
use crate::heap::Heap;
use crate::ids::{RecordId, ScriptId};
use crate::record::Value;

/// A registered script.
#[derive(Debug, Clone)]
pub struct ScriptEntry {
    /// The script record in the runtime heap.
    pub script: RecordId,
    /// The id assigned at registration.
    pub id: ScriptId,
    /// Line starts of the script source, once computed.
    pub line_index: Option<LineIndex>,
}

/// Append-only list of script records.
///
/// The registry does not own the records it lists; it only refers to them
/// by ID in the runtime heap. It is mutated by the controlling thread only.
#[derive(Debug, Clone)]
pub struct ScriptRegistry {
    entries: Vec<ScriptEntry>,
    next_id: u32,
}

impl ScriptRegistry {
    /// Creates an empty registry. Script ids start at 1.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Registers a script, assigning it a fresh id and writing that id into
    /// the script's `id` field.
    pub fn append(&mut self, heap: &mut Heap, script: RecordId) -> ScriptId {
        let id = ScriptId::from_raw(self.next_id);
        self.next_id += 1;
        if let Some(record) = heap.get_mut(script) {
            record.set_field(fields::ID, Value::Int(i64::from(id.as_raw())));
        }
        self.entries.push(ScriptEntry {
            script,
            id,
            line_index: None,
        });
        id
    }

    /// Returns the entry registered under `id`.
    pub fn get(&self, id: ScriptId) -> Option<&ScriptEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Returns the entry for a script record.
    pub fn find_by_record(&self, script: RecordId) -> Option<&ScriptEntry> {
        self.entries.iter().find(|entry| entry.script == script)
    }

    /// Stores the line index of a registered script.
    pub fn set_line_index(&mut self, id: ScriptId, line_index: LineIndex) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) {
            entry.line_index = Some(line_index);
        }
    }

    /// Iterates over entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ScriptEntry> {
        self.entries.iter()
    }

    /// Returns the number of registered scripts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no script is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ScriptRegistry {
    fn default() -> Self {
        Self::new()
    }
}
