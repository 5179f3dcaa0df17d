use serde::{Deserialize, Serialize};

use crate::error::ChecklistError;
use crate::model::{Checklist, Section, SectionId, Task, TaskId};

/// An edit to the checklist structure, dispatched from the admin screens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChecklistCommand {
    AddSection {
        name: String,
    },
    RenameSection {
        section_id: SectionId,
        name: String,
    },
    DeleteSection {
        section_id: SectionId,
    },
    AddTask {
        section_id: SectionId,
        label: String,
    },
    EditTask {
        task_id: TaskId,
        label: String,
    },
    DeleteTask {
        task_id: TaskId,
    },
}

impl Checklist {
    /// Apply a command in place.
    ///
    /// Returns `Ok(false)` when the command is a no-op (blank name or label),
    /// and an error when it references a section or task that does not exist.
    pub fn apply(&mut self, command: &ChecklistCommand) -> Result<bool, ChecklistError> {
        match command {
            ChecklistCommand::AddSection { name } => {
                let name = name.trim();
                if name.is_empty() {
                    return Ok(false);
                }
                self.sections_mut().push(Section::new(name));
                Ok(true)
            }
            ChecklistCommand::RenameSection { section_id, name } => {
                let name = name.trim();
                let section = self.section_mut(*section_id)?;
                if name.is_empty() || section.name == name {
                    return Ok(false);
                }
                section.name = name.to_string();
                Ok(true)
            }
            ChecklistCommand::DeleteSection { section_id } => {
                let sections = self.sections_mut();
                let index = sections
                    .iter()
                    .position(|s| s.id == *section_id)
                    .ok_or_else(|| ChecklistError::UnknownSection(section_id.to_string()))?;
                sections.remove(index);
                Ok(true)
            }
            ChecklistCommand::AddTask { section_id, label } => {
                let label = label.trim();
                let section = self.section_mut(*section_id)?;
                if label.is_empty() {
                    return Ok(false);
                }
                section.tasks.push(Task::new(label));
                Ok(true)
            }
            ChecklistCommand::EditTask { task_id, label } => {
                let task = self.task_mut(*task_id)?;
                if task.label == *label {
                    return Ok(false);
                }
                task.label = label.clone();
                Ok(true)
            }
            ChecklistCommand::DeleteTask { task_id } => {
                for section in self.sections_mut() {
                    if let Some(index) = section.tasks.iter().position(|t| t.id == *task_id) {
                        section.tasks.remove(index);
                        return Ok(true);
                    }
                }
                Err(ChecklistError::UnknownTask(task_id.to_string()))
            }
        }
    }

    fn section_mut(&mut self, id: SectionId) -> Result<&mut Section, ChecklistError> {
        self.sections_mut()
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ChecklistError::UnknownSection(id.to_string()))
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, ChecklistError> {
        self.sections_mut()
            .iter_mut()
            .flat_map(|s| s.tasks.iter_mut())
            .find(|t| t.id == id)
            .ok_or_else(|| ChecklistError::UnknownTask(id.to_string()))
    }
}
