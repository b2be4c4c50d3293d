//! Bounded undo/redo stacks of committed editor states.

use crate::editor::EditorState;
use std::collections::VecDeque;
use std::rc::Rc;

/// Undo/redo history. States are shared, never copied.
#[derive(Debug)]
pub struct History {
    undo: VecDeque<Rc<EditorState>>,
    redo: Vec<Rc<EditorState>>,
    limit: usize,
}

impl History {
    /// History keeping at most `limit` undo steps.
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit,
        }
    }

    /// Records the state that an edit is about to replace. Clears redo.
    pub fn record(&mut self, previous: Rc<EditorState>) {
        if self.limit == 0 {
            return;
        }
        self.redo.clear();
        self.undo.push_back(previous);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    /// Steps back from `current`, returning the state to restore.
    pub fn undo(&mut self, current: Rc<EditorState>) -> Option<Rc<EditorState>> {
        let target = self.undo.pop_back()?;
        self.redo.push(current);
        Some(target)
    }

    /// Steps forward from `current`, returning the state to restore.
    pub fn redo(&mut self, current: Rc<EditorState>) -> Option<Rc<EditorState>> {
        let target = self.redo.pop()?;
        self.undo.push_back(current);
        Some(target)
    }

    /// Whether an undo step exists.
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether a redo step exists.
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Drops every recorded step.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
