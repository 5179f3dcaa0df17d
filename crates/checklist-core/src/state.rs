//! Single source of truth for the checklist during a session
//!
//! Renderers read from [`ChecklistState::checklist`]; edits go through
//! [`ChecklistState::dispatch`], which applies the command and persists the
//! result in one step so the displayed and the stored checklist never diverge.

use crate::command::ChecklistCommand;
use crate::error::ChecklistError;
use crate::model::Checklist;
use crate::store::{ChecklistStore, KeyValueStore, LoadSource};

/// Outcome of a dispatched command
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    /// Whether the checklist changed
    pub changed: bool,
    /// Result of persisting the change. A failure leaves the in-memory edit in
    /// place; it just won't survive a reload.
    pub persisted: Result<(), ChecklistError>,
}

pub struct ChecklistState<S> {
    store: ChecklistStore<S>,
    checklist: Checklist,
    source: LoadSource,
}

impl<S: KeyValueStore> ChecklistState<S> {
    /// Load the current checklist from the store
    pub fn load(store: ChecklistStore<S>) -> Self {
        let outcome = store.load();
        Self {
            store,
            checklist: outcome.checklist,
            source: outcome.source,
        }
    }

    pub fn checklist(&self) -> &Checklist {
        &self.checklist
    }

    /// How the checklist was obtained when the state was loaded
    pub fn source(&self) -> &LoadSource {
        &self.source
    }

    pub fn store(&self) -> &ChecklistStore<S> {
        &self.store
    }

    /// Copy of the current checklist, detached from further edits
    pub fn snapshot(&self) -> Checklist {
        self.checklist.clone()
    }

    pub fn dispatch(&mut self, command: &ChecklistCommand) -> Result<Dispatched, ChecklistError> {
        let changed = self.checklist.apply(command)?;
        let persisted = if changed {
            self.store.save(&self.checklist)
        } else {
            Ok(())
        };
        Ok(Dispatched { changed, persisted })
    }

    /// Re-read the persisted checklist, discarding in-memory state
    pub fn reload(&mut self) {
        let outcome = self.store.load();
        self.checklist = outcome.checklist;
        self.source = outcome.source;
    }
}
