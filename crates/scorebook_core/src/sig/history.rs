//! Linear undo/redo log of edit tasks.
//!
//! # Invariants
//! - Tasks `[0, applied)` are applied to the graph, `[applied, len)` are
//!   undone and available for redo.
//! - Pushing a new task drops the redo tail; history never branches.
//! - A failed task operation leaves the cursor where it was.

use crate::sig::graph::SymbolGraph;
use crate::sig::task::{EditResult, InterTask};
use log::{debug, error};

/// Undo/redo stack bound to one symbol graph.
#[derive(Debug, Default)]
pub struct EditLog {
    tasks: Vec<Box<dyn InterTask>>,
    applied: usize,
    capacity: Option<usize>,
}

impl EditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log keeping at most `capacity` tasks; the oldest applied task is
    /// forgotten first.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        let mut log = Self::new();
        log.set_capacity_limit(Some(capacity));
        log
    }

    pub fn capacity_limit(&self) -> Option<usize> {
        self.capacity
    }

    /// Changes the task limit, forgetting the oldest applied tasks first and
    /// then the newest undone ones until the log fits.
    pub fn set_capacity_limit(&mut self, capacity: Option<usize>) {
        self.capacity = capacity.map(|capacity| capacity.max(1));
        let Some(capacity) = self.capacity else {
            return;
        };
        while self.tasks.len() > capacity {
            if self.applied > 0 {
                self.tasks.remove(0);
                self.applied -= 1;
            } else {
                self.tasks.pop();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.tasks.len()
    }

    /// Action name of the task the next `undo` would reverse.
    pub fn undo_action(&self) -> Option<&'static str> {
        self.applied
            .checked_sub(1)
            .map(|index| self.tasks[index].action_name())
    }

    /// Action name of the task the next `redo` would replay.
    pub fn redo_action(&self) -> Option<&'static str> {
        self.tasks.get(self.applied).map(|task| task.action_name())
    }

    /// Applies `task` and records it as the most recent edit.
    ///
    /// A task whose first apply fails is not recorded.
    pub fn push(&mut self, task: Box<dyn InterTask>, graph: &mut SymbolGraph) -> EditResult<()> {
        if let Err(err) = task.perform_do(graph) {
            error!(
                "event=edit_do module=sig status=error action={} inter={} error={}",
                task.action_name(),
                task.inter_id(),
                err
            );
            return Err(err);
        }

        self.tasks.truncate(self.applied);
        debug!(
            "event=edit_do module=sig status=ok action={} inter={}",
            task.action_name(),
            task.inter_id()
        );
        self.tasks.push(task);
        self.applied += 1;

        if let Some(capacity) = self.capacity {
            if self.tasks.len() > capacity {
                self.tasks.remove(0);
                self.applied -= 1;
            }
        }
        Ok(())
    }

    /// Reverses the most recently applied task.
    ///
    /// Returns `Ok(false)` when nothing is left to undo.
    pub fn undo(&mut self, graph: &mut SymbolGraph) -> EditResult<bool> {
        let Some(index) = self.applied.checked_sub(1) else {
            return Ok(false);
        };
        let task = &self.tasks[index];
        if let Err(err) = task.perform_undo(graph) {
            error!(
                "event=edit_undo module=sig status=error action={} inter={} error={}",
                task.action_name(),
                task.inter_id(),
                err
            );
            return Err(err);
        }
        debug!(
            "event=edit_undo module=sig status=ok action={} inter={}",
            task.action_name(),
            task.inter_id()
        );
        self.applied = index;
        Ok(true)
    }

    /// Replays the most recently undone task.
    ///
    /// Returns `Ok(false)` when nothing is left to redo.
    pub fn redo(&mut self, graph: &mut SymbolGraph) -> EditResult<bool> {
        let Some(task) = self.tasks.get(self.applied) else {
            return Ok(false);
        };
        if let Err(err) = task.perform_redo(graph) {
            error!(
                "event=edit_redo module=sig status=error action={} inter={} error={}",
                task.action_name(),
                task.inter_id(),
                err
            );
            return Err(err);
        }
        debug!(
            "event=edit_redo module=sig status=ok action={} inter={}",
            task.action_name(),
            task.inter_id()
        );
        self.applied += 1;
        Ok(true)
    }

    /// Forgets every task without touching the graph.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.applied = 0;
    }
}
