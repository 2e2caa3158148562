// ============================================================================
// EDIT HISTORY: append/branch stack of immutable parameter snapshots
// ============================================================================
//
// Every commit deep-copies the current entry, overlays the new values,
// discards anything past the current index and appends. Entries are never
// mutated once another entry has been built from them. Undo/redo only move
// the index; the pixels are rebuilt from the selected snapshot by the
// render orchestrator.
// ============================================================================

use tracing::{debug, info};

use crate::mask::{Mask, MaskId};
use crate::params::GlobalEdits;

// ============================================================================
// HISTORY ENTRY
// ============================================================================

/// One snapshot: global edits, the ordered mask stack and the mask selection.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    pub global_edits: GlobalEdits,
    /// Compositing order: later masks are layered on top.
    pub masks: Vec<Mask>,
    /// Lookup key into `masks`, never an owning reference.
    pub active_mask_id: Option<MaskId>,
    pub action_name: String,
}

impl HistoryEntry {
    pub fn empty(action_name: impl Into<String>) -> Self {
        Self {
            global_edits: GlobalEdits::default(),
            masks: Vec::new(),
            active_mask_id: None,
            action_name: action_name.into(),
        }
    }

    pub fn mask(&self, id: MaskId) -> Option<&Mask> {
        self.masks.iter().find(|m| m.id == id)
    }

    pub fn mask_mut(&mut self, id: MaskId) -> Option<&mut Mask> {
        self.masks.iter_mut().find(|m| m.id == id)
    }

    pub fn active_mask(&self) -> Option<&Mask> {
        self.active_mask_id.and_then(|id| self.mask(id))
    }

    pub fn active_mask_mut(&mut self) -> Option<&mut Mask> {
        let id = self.active_mask_id?;
        self.mask_mut(id)
    }
}

// ============================================================================
// EDIT HISTORY
// ============================================================================

/// Linear undo history. `index` is `None` only while the history is empty.
///
/// The stack is unbounded: entries only disappear when a commit discards the
/// redo branch or the history is reset.
#[derive(Clone, Debug, Default)]
pub struct EditHistory {
    entries: Vec<HistoryEntry>,
    index: Option<usize>,
}

impl EditHistory {
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.index.and_then(|i| self.entries.get(i))
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Build a new entry from a copy of the current one (or an empty entry),
    /// let `edit` overlay its changes, then truncate-and-append.
    /// Returns the new current index.
    pub fn commit_with<F>(&mut self, action_name: &str, edit: F) -> usize
    where
        F: FnOnce(&mut HistoryEntry),
    {
        let mut entry = self
            .current()
            .cloned()
            .unwrap_or_else(|| HistoryEntry::empty(action_name));
        edit(&mut entry);
        entry.action_name = action_name.to_string();
        if let Some(id) = entry.active_mask_id
            && entry.mask(id).is_none()
        {
            entry.active_mask_id = None;
        }
        self.push(entry)
    }

    /// Commit explicit global edits and mask list. The active mask survives
    /// if it is still present in `masks`.
    pub fn commit(&mut self, action_name: &str, global_edits: GlobalEdits, masks: Vec<Mask>) -> usize {
        self.commit_with(action_name, |entry| {
            entry.global_edits = global_edits;
            entry.masks = masks;
        })
    }

    fn push(&mut self, entry: HistoryEntry) -> usize {
        let keep = self.index.map_or(0, |i| i + 1);
        if keep < self.entries.len() {
            debug!(dropped = self.entries.len() - keep, "discarding redo branch");
        }
        self.entries.truncate(keep);
        info!(action = %entry.action_name, "history commit");
        self.entries.push(entry);
        let idx = self.entries.len() - 1;
        self.index = Some(idx);
        idx
    }

    /// Drop everything and start over with one fresh default entry.
    pub fn reset(&mut self, action_name: &str) {
        self.entries.clear();
        self.index = None;
        self.push(HistoryEntry::empty(action_name));
    }

    /// Step back one entry. The first entry is the floor.
    pub fn undo(&mut self) -> bool {
        match self.index {
            Some(i) if i > 0 => {
                self.index = Some(i - 1);
                true
            }
            _ => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.index {
            Some(i) if i + 1 < self.entries.len() => {
                self.index = Some(i + 1);
                true
            }
            _ => false,
        }
    }

    /// Select any existing entry (history list click).
    pub fn jump_to(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.index = Some(index);
            true
        } else {
            false
        }
    }

    pub fn can_undo(&self) -> bool {
        self.index.is_some_and(|i| i > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.index.is_some_and(|i| i + 1 < self.entries.len())
    }

    /// Action labels, oldest first, for the history list.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.action_name.as_str()).collect()
    }
}
