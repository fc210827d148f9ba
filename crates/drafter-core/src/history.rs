//! Undo/redo history of generation results.
//!
//! Only generation runs are recorded; manual edits are the editor's own
//! business. History is kept per session and evicted when the session
//! closes.

use std::collections::HashMap;

/// Buffer contents before and after one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub before: String,
    pub after: String,
}

/// Undo and redo stacks for a single session.
#[derive(Debug, Clone, Default)]
pub struct GenerationHistory {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
}

impl GenerationHistory {
    /// Records a finished run. Identical snapshots are ignored; any recorded
    /// run invalidates the redo stack.
    pub fn record(&mut self, before: String, after: String) -> bool {
        if before == after {
            return false;
        }
        self.undo.push(HistoryEntry { before, after });
        self.redo.clear();
        true
    }

    /// Pops the latest run and returns the text to restore.
    pub fn undo(&mut self) -> Option<&str> {
        let entry = self.undo.pop()?;
        self.redo.push(entry);
        self.redo.last().map(|e| e.before.as_str())
    }

    /// Re-applies the most recently undone run and returns its result.
    pub fn redo(&mut self) -> Option<&str> {
        let entry = self.redo.pop()?;
        self.undo.push(entry);
        self.undo.last().map(|e| e.after.as_str())
    }

    /// The text [`undo`](Self::undo) would restore, without moving anything.
    pub fn peek_undo(&self) -> Option<&str> {
        self.undo.last().map(|e| e.before.as_str())
    }

    pub fn peek_redo(&self) -> Option<&str> {
        self.redo.last().map(|e| e.after.as_str())
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }
}

/// Generation histories keyed by session id.
#[derive(Debug, Default)]
pub struct HistoryTable {
    sessions: HashMap<String, GenerationHistory>,
}

impl HistoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the history for a session, creating an empty one if needed.
    pub fn entry(&mut self, session_id: &str) -> &mut GenerationHistory {
        self.sessions.entry(session_id.to_string()).or_default()
    }

    pub fn get(&self, session_id: &str) -> Option<&GenerationHistory> {
        self.sessions.get(session_id)
    }

    /// Drops a session's history.
    pub fn evict(&mut self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    pub fn can_undo(&self, session_id: &str) -> bool {
        self.get(session_id).is_some_and(GenerationHistory::can_undo)
    }

    pub fn can_redo(&self, session_id: &str) -> bool {
        self.get(session_id).is_some_and(GenerationHistory::can_redo)
    }
}
