//! Per-task state collected from the UI at report time

use std::collections::HashMap;

use crate::decoder::ImageSource;
use crate::error::ChecklistError;
use crate::model::{Section, Task, TaskId};

/// A task together with its position in the checklist being compiled
#[derive(Debug, Clone, Copy)]
pub struct TaskRef<'a> {
    pub section_index: usize,
    pub task_index: usize,
    pub section: &'a Section,
    pub task: &'a Task,
}

/// What the inspector entered for one task
#[derive(Debug, Clone, Default)]
pub struct TaskArtifact {
    pub completed: bool,
    /// Trimmed comment, empty when none was entered
    pub comment: String,
    pub photo: Option<ImageSource>,
}

impl TaskArtifact {
    /// Build an artifact from raw UI values. Only the first photo is kept.
    pub fn new<I>(completed: bool, comment: &str, photos: I) -> Self
    where
        I: IntoIterator<Item = ImageSource>,
    {
        Self {
            completed,
            comment: comment.trim().to_string(),
            photo: photos.into_iter().next(),
        }
    }

    pub fn completed() -> Self {
        Self {
            completed: true,
            ..Self::default()
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.trim().to_string();
        self
    }

    pub fn with_photo(mut self, photo: ImageSource) -> Self {
        self.photo = Some(photo);
        self
    }

    pub fn comment(&self) -> Option<&str> {
        (!self.comment.is_empty()).then_some(self.comment.as_str())
    }
}

/// Resolves the UI state of a task. Absent state yields the default artifact;
/// this never fails.
pub trait ArtifactLocator {
    fn locate(&self, at: &TaskRef<'_>) -> TaskArtifact;
}

impl<L: ArtifactLocator + ?Sized> ArtifactLocator for &L {
    fn locate(&self, at: &TaskRef<'_>) -> TaskArtifact {
        (**self).locate(at)
    }
}

/// Drawing surface holding the inspector's signature
pub trait SignatureSurface {
    /// Snapshot the current strokes as an image
    fn rasterize(&self) -> Result<ImageSource, ChecklistError>;
}

impl SignatureSurface for ImageSource {
    fn rasterize(&self) -> Result<ImageSource, ChecklistError> {
        Ok(self.clone())
    }
}

/// In-memory artifacts keyed by task id, with positional entries as fallback
#[derive(Debug, Default)]
pub struct ArtifactMap {
    by_id: HashMap<TaskId, TaskArtifact>,
    by_position: HashMap<(usize, usize), TaskArtifact>,
}

impl ArtifactMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task_id: TaskId, artifact: TaskArtifact) -> &mut Self {
        self.by_id.insert(task_id, artifact);
        self
    }

    pub fn insert_at(
        &mut self,
        section_index: usize,
        task_index: usize,
        artifact: TaskArtifact,
    ) -> &mut Self {
        self.by_position
            .insert((section_index, task_index), artifact);
        self
    }

    pub fn len(&self) -> usize {
        self.by_id.len() + self.by_position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactLocator for ArtifactMap {
    fn locate(&self, at: &TaskRef<'_>) -> TaskArtifact {
        self.by_id
            .get(&at.task.id)
            .or_else(|| self.by_position.get(&(at.section_index, at.task_index)))
            .cloned()
            .unwrap_or_default()
    }
}
