//! Checklist data model
//!
//! A [`Checklist`] is an ordered list of [`Section`]s, each holding an ordered
//! list of [`Task`]s. Sections and tasks carry stable identifiers generated at
//! creation, so UI state bound to a task survives insertions, deletions and
//! reordering elsewhere in the list.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChecklistError;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self, ChecklistError> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| ChecklistError::Serialization(format!("Invalid id '{}': {}", s, e)))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// Stable identifier of a section
    SectionId
);
id_type!(
    /// Stable identifier of a task, used to bind UI artifacts
    TaskId
);

/// A single checkable inspection item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub label: String,
}

impl Task {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            label: label.into(),
        }
    }
}

/// A named, ordered group of tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    pub tasks: Vec<Task>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SectionId::new(),
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    pub fn with_tasks<I, T>(name: impl Into<String>, tasks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            id: SectionId::new(),
            name: name.into(),
            tasks: tasks.into_iter().map(Task::new).collect(),
        }
    }
}

/// The entire checkable structure for one reporting period
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checklist {
    sections: Vec<Section>,
}

/// Task as stored on disk: either the current `{id, label}` object or a bare
/// label written by older versions.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTask {
    Current { id: TaskId, label: String },
    Legacy(String),
}

#[derive(Deserialize)]
struct StoredSection {
    #[serde(default)]
    id: Option<SectionId>,
    name: String,
    #[serde(default)]
    tasks: Vec<StoredTask>,
}

/// Result of parsing persisted JSON
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub checklist: Checklist,
    /// True when the JSON used the legacy id-less layout and ids were generated
    pub upgraded: bool,
}

impl Checklist {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Built-in checklist installed on first use
    pub fn default_inspection() -> Self {
        Self::new(vec![
            Section::with_tasks(
                "Chaufferies",
                [
                    "Contrôler la chaufferie 1",
                    "Contrôler la chaufferie 2",
                    "Contrôler la chaufferie 3",
                ],
            ),
            Section::with_tasks(
                "Contrôle général",
                [
                    "Inspection des parties communes",
                    "Vérifier l'éclairage de sécurité",
                    "Contrôler des alarmes incendie",
                ],
            ),
            Section::with_tasks(
                "Piscines et spa",
                [
                    "Contrôler la piscine extérieure",
                    "Relever la température de la piscine extérieure",
                    "Prélèvement d'un échantillon d'eau de la piscine du spa",
                ],
            ),
            Section::with_tasks(
                "Pompes de relevage",
                [
                    "Vérifier la pompe de relevage 1",
                    "Vérifier la pompe de relevage 2",
                ],
            ),
        ])
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub(crate) fn sections_mut(&mut self) -> &mut Vec<Section> {
        &mut self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Total number of tasks across all sections
    pub fn task_count(&self) -> usize {
        self.sections.iter().map(|s| s.tasks.len()).sum()
    }

    pub fn section(&self, id: SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Find a task and return its positional coordinates with it
    pub fn find_task(&self, id: TaskId) -> Option<(usize, usize, &Task)> {
        self.sections.iter().enumerate().find_map(|(si, section)| {
            section
                .tasks
                .iter()
                .enumerate()
                .find(|(_, t)| t.id == id)
                .map(|(ti, t)| (si, ti, t))
        })
    }

    pub fn to_json(&self) -> Result<String, ChecklistError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse persisted JSON, accepting both the current and the legacy layout
    pub fn from_json(json: &str) -> Result<Parsed, ChecklistError> {
        let stored: Vec<StoredSection> = serde_json::from_str(json)?;
        let mut upgraded = false;

        let sections = stored
            .into_iter()
            .map(|s| {
                let id = s.id.unwrap_or_else(|| {
                    upgraded = true;
                    SectionId::new()
                });
                let tasks = s
                    .tasks
                    .into_iter()
                    .map(|t| match t {
                        StoredTask::Current { id, label } => Task { id, label },
                        StoredTask::Legacy(label) => {
                            upgraded = true;
                            Task::new(label)
                        }
                    })
                    .collect();
                Section {
                    id,
                    name: s.name,
                    tasks,
                }
            })
            .collect();

        Ok(Parsed {
            checklist: Checklist::new(sections),
            upgraded,
        })
    }
}
