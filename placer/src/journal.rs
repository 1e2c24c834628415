//! Reversible record of placement primitives.

use drt_common::db::indices::CellId;
use std::collections::BTreeSet;

/// `(row, site)` of a cell's leftmost site.
pub type Slot = (u32, u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JournalAction {
    Place { cell: CellId, to: Slot },
    Unplace { cell: CellId, from: Slot },
    Move { cell: CellId, from: Slot, to: Slot },
}

impl JournalAction {
    pub fn cell(&self) -> CellId {
        match *self {
            JournalAction::Place { cell, .. }
            | JournalAction::Unplace { cell, .. }
            | JournalAction::Move { cell, .. } => cell,
        }
    }

    pub fn before(&self) -> Option<Slot> {
        match *self {
            JournalAction::Place { .. } => None,
            JournalAction::Unplace { from, .. } | JournalAction::Move { from, .. } => Some(from),
        }
    }

    pub fn after(&self) -> Option<Slot> {
        match *self {
            JournalAction::Unplace { .. } => None,
            JournalAction::Place { to, .. } | JournalAction::Move { to, .. } => Some(to),
        }
    }
}

/// Done and undone action stacks. Recording a new action discards the
/// redo stack.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    done: Vec<JournalAction>,
    undone: Vec<JournalAction>,
    touched: BTreeSet<CellId>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_action(&mut self, action: JournalAction) {
        self.undone.clear();
        self.touched.insert(action.cell());
        self.done.push(action);
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn actions(&self) -> &[JournalAction] {
        &self.done
    }

    /// Cells named by any action since the last `clear_touched`.
    pub fn touched(&self) -> impl Iterator<Item = CellId> + '_ {
        self.touched.iter().copied()
    }

    pub fn clear_touched(&mut self) {
        self.touched.clear();
    }

    pub fn clear(&mut self) {
        self.done.clear();
        self.undone.clear();
        self.touched.clear();
    }

    pub(crate) fn discard_redo(&mut self) {
        self.undone.clear();
    }

    pub(crate) fn pop_done(&mut self) -> Option<JournalAction> {
        self.done.pop()
    }

    pub(crate) fn push_undone(&mut self, a: JournalAction) {
        self.undone.push(a);
    }

    pub(crate) fn pop_undone(&mut self) -> Option<JournalAction> {
        self.undone.pop()
    }

    pub(crate) fn push_done(&mut self, a: JournalAction) {
        self.touched.insert(a.cell());
        self.done.push(a);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_clears_redo() {
        let mut j = Journal::new();
        let a = JournalAction::Move {
            cell: CellId(1),
            from: (0, 0),
            to: (0, 4),
        };
        j.add_action(a);
        let popped = j.pop_done().unwrap();
        j.push_undone(popped);
        assert!(j.can_redo());
        j.add_action(JournalAction::Unplace {
            cell: CellId(2),
            from: (1, 3),
        });
        assert!(!j.can_redo());
        assert_eq!(j.touched().collect::<Vec<_>>(), vec![CellId(1), CellId(2)]);
        assert_eq!(a.before(), Some((0, 0)));
        assert_eq!(a.after(), Some((0, 4)));
    }
}
