//! Inspection checklist persistence and report compilation
//!
//! The checklist lives in a [`ChecklistState`] backed by any
//! [`KeyValueStore`]. At report time the current snapshot is compiled against
//! per-task artifacts into a [`Report`], rendered to PDF and handed to a
//! [`DocumentSink`].
//!
//! Features:
//! - `native` (default): tokio-backed timer, disk files and file sink
//! - `wasm`: browser builds, where the host supplies those collaborators

pub mod artifact;
pub mod command;
pub mod config;
pub mod decoder;
pub mod error;
pub mod model;
pub mod render;
pub mod report;
pub mod sink;
pub mod state;
pub mod store;
pub mod timer;

pub use artifact::{ArtifactLocator, ArtifactMap, SignatureSurface, TaskArtifact, TaskRef};
pub use command::ChecklistCommand;
pub use config::{LayoutConfig, PaginationPolicy, ReportConfig, ReportLabels, StoreConfig};
pub use decoder::{DataUrl, DecodedImage, ImageDecoder, ImageSource, NativeImageDecoder, PhotoFile};
pub use error::{ChecklistError, StoreError};
pub use model::{Checklist, Section, SectionId, Task, TaskId};
pub use render::PdfRenderer;
pub use report::{BlockRole, DrawInstruction, Report, ReportCompiler, ReportInput};
pub use sink::{DocumentSink, MemorySink};
pub use state::{ChecklistState, Dispatched};
pub use store::{ChecklistStore, KeyValueStore, LoadOutcome, LoadSource, MemoryStore};
pub use timer::{NoTimer, Timer};

#[cfg(feature = "native")]
pub use decoder::DiskFile;
#[cfg(feature = "native")]
pub use sink::FileSink;
#[cfg(feature = "native")]
pub use timer::TokioTimer;

use serde::Serialize;
use tracing::info;

/// Host-provided collaborators for [`generate_report`]
pub struct ReportServices<'a> {
    pub decoder: &'a dyn ImageDecoder,
    pub timer: &'a dyn Timer,
    pub sink: &'a dyn DocumentSink,
}

/// Checklist and logo as they were when report generation started
#[derive(Debug, Clone)]
pub struct ReportSnapshot {
    pub checklist: Checklist,
    pub logo: Option<ImageSource>,
}

impl ReportSnapshot {
    pub fn capture<S: KeyValueStore>(state: &ChecklistState<S>) -> Self {
        Self {
            checklist: state.snapshot(),
            logo: state.store().load_logo().map(ImageSource::DataUrl),
        }
    }
}

/// Summary of a saved report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReport {
    pub filename: String,
    pub page_count: usize,
    pub size: usize,
}

/// Compile, render and save a report.
///
/// Edits made after the snapshot was captured do not affect this report. The
/// sink only ever receives a complete document.
pub async fn generate_report(
    snapshot: &ReportSnapshot,
    config: &ReportConfig,
    services: &ReportServices<'_>,
    locator: &dyn ArtifactLocator,
    signature: Option<&dyn SignatureSurface>,
) -> Result<GeneratedReport, ChecklistError> {
    config.validate()?;

    let mut input = ReportInput::new(&snapshot.checklist).with_logo(snapshot.logo.clone());
    if let Some(surface) = signature {
        input = input.with_signature(surface);
    }

    let report = ReportCompiler::new(config, services.decoder, services.timer)
        .compile(input, locator)
        .await;

    let bytes = PdfRenderer::new()
        .with_title(config.labels.title.clone())
        .with_placeholders(
            config.labels.photo_placeholder.clone(),
            config.labels.signature_placeholder.clone(),
            config.layout.comment_font_size,
        )
        .render(&report)?;
    let size = bytes.len();

    services.sink.save(&report.filename, bytes).await?;

    info!(
        "Generated '{}' ({} pages, {} bytes)",
        report.filename,
        report.page_count(),
        size
    );
    Ok(GeneratedReport {
        filename: report.filename.clone(),
        page_count: report.page_count(),
        size,
    })
}
