//! Persistence of the checklist and logo in a string-keyed blob store

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{ChecklistError, StoreError};
use crate::model::Checklist;

/// Minimal string key-value store (browser `localStorage` or equivalent)
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// In-memory store, optionally bounded to emulate a storage quota
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: RefCell::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.borrow_mut();
        if let Some(quota) = self.quota_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > quota {
                return Err(StoreError::QuotaExceeded);
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Where a loaded checklist came from
#[derive(Debug, Clone, PartialEq)]
pub enum LoadSource {
    Stored,
    /// Legacy layout converted and written back with fresh ids
    Upgraded,
    /// Built-in defaults; `reason` is set when stored data could not be used
    Defaults { reason: Option<ChecklistError> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub checklist: Checklist,
    pub source: LoadSource,
}

/// Loads and saves the checklist and logo. Never fails on load: unusable
/// state degrades to the built-in defaults.
pub struct ChecklistStore<S> {
    backend: S,
    config: StoreConfig,
}

impl<S: KeyValueStore> ChecklistStore<S> {
    pub fn new(backend: S) -> Self {
        Self::with_config(backend, StoreConfig::default())
    }

    pub fn with_config(backend: S, config: StoreConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn load(&self) -> LoadOutcome {
        let key = self.config.sections_key();
        let reason = match self.backend.get(&key) {
            Ok(Some(json)) => match Checklist::from_json(&json) {
                Ok(parsed) if parsed.upgraded => {
                    debug!(key = %key, "Upgrading legacy checklist layout");
                    // Persist generated ids so UI bindings stay stable across reloads
                    let _ = self.save(&parsed.checklist);
                    return LoadOutcome {
                        checklist: parsed.checklist,
                        source: LoadSource::Upgraded,
                    };
                }
                Ok(parsed) => {
                    return LoadOutcome {
                        checklist: parsed.checklist,
                        source: LoadSource::Stored,
                    };
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Stored checklist is unreadable, using defaults");
                    Some(ChecklistError::PersistenceRead(e.to_string()))
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Unable to load checklist, using defaults");
                Some(ChecklistError::PersistenceRead(e.to_string()))
            }
        };

        let checklist = Checklist::default_inspection();
        let _ = self.save(&checklist);
        LoadOutcome {
            checklist,
            source: LoadSource::Defaults { reason },
        }
    }

    /// Overwrite the persisted checklist
    pub fn save(&self, checklist: &Checklist) -> Result<(), ChecklistError> {
        let key = self.config.sections_key();
        let json = checklist.to_json().inspect_err(|e| {
            warn!(key = %key, error = %e, "Unable to serialize checklist");
        })?;
        self.backend.set(&key, &json).map_err(|e| {
            warn!(key = %key, error = %e, "Unable to save checklist");
            ChecklistError::PersistenceWrite(e.to_string())
        })
    }

    /// Stored logo as a data URL, if any
    pub fn load_logo(&self) -> Option<String> {
        let key = self.config.logo_key();
        match self.backend.get(&key) {
            Ok(Some(logo)) if !logo.is_empty() => Some(logo),
            Ok(_) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Unable to load logo");
                None
            }
        }
    }

    pub fn save_logo(&self, data_url: &str) -> Result<(), ChecklistError> {
        let key = self.config.logo_key();
        self.backend.set(&key, data_url).map_err(|e| {
            warn!(key = %key, error = %e, "Unable to save logo");
            ChecklistError::PersistenceWrite(e.to_string())
        })
    }

    pub fn clear_logo(&self) -> Result<(), ChecklistError> {
        let key = self.config.logo_key();
        self.backend
            .remove(&key)
            .map_err(|e| ChecklistError::PersistenceWrite(e.to_string()))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::model::Section;
    use proptest::prelude::*;

    fn checklist_strategy() -> impl Strategy<Value = Checklist> {
        prop::collection::vec(
            (".{0,20}", prop::collection::vec(".{0,30}", 0..6)),
            0..6,
        )
        .prop_map(|sections| {
            Checklist::new(
                sections
                    .into_iter()
                    .map(|(name, tasks)| Section::with_tasks(name, tasks))
                    .collect(),
            )
        })
    }

    proptest! {
        /// Property: save followed by load yields the same checklist
        #[test]
        fn save_load_round_trip(checklist in checklist_strategy()) {
            let store = ChecklistStore::new(MemoryStore::new());
            store.save(&checklist).unwrap();
            let outcome = store.load();
            prop_assert_eq!(outcome.source, LoadSource::Stored);
            prop_assert_eq!(outcome.checklist, checklist);
        }
    }
}
