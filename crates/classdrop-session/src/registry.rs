//! Single-owner task registry.
//!
//! All task mutation goes through [`TaskRegistry::apply`], which enforces the
//! task state machine. The session keeps the registry behind one lock so
//! interleaved progress callbacks from different transfers can never observe
//! or produce a half-applied state.

use classdrop_core::models::InvalidTransition;
use classdrop_core::{SourceFile, Transition, UploadTask};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub(crate) struct TaskEntry {
    pub task: UploadTask,
    /// Kept for explicit re-submission
    pub source: SourceFile,
    pub folder: String,
    pub cancel: CancellationToken,
}

#[derive(Default)]
pub(crate) struct TaskRegistry {
    entries: Vec<TaskEntry>,
    index: HashMap<Uuid, usize>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn insert(&mut self, entry: TaskEntry) {
        self.index.insert(entry.task.id, self.entries.len());
        self.entries.push(entry);
    }

    pub fn entry(&self, id: Uuid) -> Option<&TaskEntry> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> impl Iterator<Item = &TaskEntry> {
        self.entries.iter()
    }

    pub fn get(&self, id: Uuid) -> Option<&UploadTask> {
        self.entry(id).map(|entry| &entry.task)
    }

    /// Tasks in insertion order.
    pub fn snapshot(&self) -> Vec<UploadTask> {
        self.entries.iter().map(|entry| entry.task.clone()).collect()
    }

    /// True when every task is terminal (vacuously true when empty).
    pub fn all_terminal(&self) -> bool {
        self.entries.iter().all(|entry| entry.task.is_terminal())
    }

    /// Apply a transition, returning the updated task when it changed.
    pub fn apply(
        &mut self,
        id: Uuid,
        transition: Transition,
    ) -> Result<Option<UploadTask>, InvalidTransition> {
        let Some(&i) = self.index.get(&id) else {
            return Ok(None);
        };
        let task = &mut self.entries[i].task;
        if task.apply(transition)? {
            Ok(Some(task.clone()))
        } else {
            Ok(None)
        }
    }
}
