//! Report compilation
//!
//! Walks a checklist snapshot top to bottom, resolving each task's artifact
//! and decoding photos one at a time, while a vertical cursor tracks where the
//! next block goes on the current page.

use tracing::{debug, info, warn};

use super::{BlockRole, DrawInstruction, Report};
use crate::artifact::{ArtifactLocator, SignatureSurface, TaskRef};
use crate::config::{PaginationPolicy, ReportConfig};
use crate::decoder::{DecodedImage, ImageDecoder, ImageSource};
use crate::error::ChecklistError;
use crate::model::Checklist;
use crate::timer::{with_timeout, Timer};

/// Everything a report is compiled from, besides the per-task artifacts
pub struct ReportInput<'a> {
    pub checklist: &'a Checklist,
    pub logo: Option<ImageSource>,
    pub signature: Option<&'a dyn SignatureSurface>,
}

impl<'a> ReportInput<'a> {
    pub fn new(checklist: &'a Checklist) -> Self {
        Self {
            checklist,
            logo: None,
            signature: None,
        }
    }

    pub fn with_logo(mut self, logo: Option<ImageSource>) -> Self {
        self.logo = logo;
        self
    }

    pub fn with_signature(mut self, signature: &'a dyn SignatureSurface) -> Self {
        self.signature = Some(signature);
        self
    }
}

pub struct ReportCompiler<'a> {
    config: &'a ReportConfig,
    decoder: &'a dyn ImageDecoder,
    timer: &'a dyn Timer,
}

impl<'a> ReportCompiler<'a> {
    pub fn new(
        config: &'a ReportConfig,
        decoder: &'a dyn ImageDecoder,
        timer: &'a dyn Timer,
    ) -> Self {
        Self {
            config,
            decoder,
            timer,
        }
    }

    /// Compile the report. Image failures degrade to placeholders or skipped
    /// blocks, so this always produces a report.
    pub async fn compile(&self, input: ReportInput<'_>, locator: &dyn ArtifactLocator) -> Report {
        let layout = &self.config.layout;
        let labels = &self.config.labels;
        let mut cursor = Cursor::new(self.config);

        if let Some(logo) = &input.logo {
            match self.decode(logo).await {
                Ok(image) => {
                    let height = image.scaled_height(layout.logo_width);
                    cursor.image(
                        BlockRole::Logo,
                        layout.heading_x,
                        layout.logo_width,
                        height,
                        image,
                    );
                    cursor.advance(height + layout.logo_gap);
                }
                Err(e) => warn!("Skipping logo: {}", e),
            }
        }

        cursor.text(
            BlockRole::Title,
            layout.heading_x,
            layout.title_font_size,
            labels.title.clone(),
            layout.title_advance,
        );

        for (section_index, section) in input.checklist.sections().iter().enumerate() {
            cursor.text(
                BlockRole::SectionHeading,
                layout.heading_x,
                layout.section_font_size,
                section.name.clone(),
                layout.section_advance,
            );

            for (task_index, task) in section.tasks.iter().enumerate() {
                let at = TaskRef {
                    section_index,
                    task_index,
                    section,
                    task,
                };
                let artifact = locator.locate(&at);

                let status = if artifact.completed {
                    &labels.completed
                } else {
                    &labels.not_completed
                };
                cursor.text(
                    BlockRole::TaskStatus,
                    layout.task_x,
                    layout.task_font_size,
                    format!("- {}: {}", task.label, status),
                    layout.line_advance,
                );

                if let Some(comment) = artifact.comment() {
                    cursor.text(
                        BlockRole::Comment,
                        layout.detail_x,
                        layout.comment_font_size,
                        format!("{}: {}", labels.comment_prefix, comment),
                        layout.line_advance,
                    );
                }

                if let Some(photo) = &artifact.photo {
                    match self.decode(photo).await {
                        Ok(image) => {
                            let height = image.scaled_height(layout.photo_width);
                            cursor.image(
                                BlockRole::Photo,
                                layout.detail_x,
                                layout.photo_width,
                                height,
                                image,
                            );
                            cursor.advance(height + layout.photo_gap);
                        }
                        Err(e) => {
                            warn!(
                                "Photo for task '{}' in section '{}' ({}) could not be decoded: {}",
                                task.label,
                                section.name,
                                photo.describe(),
                                e
                            );
                            cursor.text(
                                BlockRole::PhotoPlaceholder,
                                layout.detail_x,
                                layout.comment_font_size,
                                labels.photo_placeholder.clone(),
                                layout.line_advance,
                            );
                        }
                    }
                }
            }

            cursor.advance(layout.section_gap);
            cursor.end_section();
            debug!(
                "Compiled section '{}' ({} tasks), cursor at {:.1}",
                section.name,
                section.tasks.len(),
                cursor.y
            );
        }

        if let Some(surface) = input.signature {
            self.signature(&mut cursor, surface).await;
        }

        cursor.footer();

        let report = cursor.finish();
        info!(
            "Compiled report '{}': {} sections, {} pages, {} blocks",
            report.filename,
            input.checklist.len(),
            report.page_count(),
            report.instructions.len()
        );
        report
    }

    async fn signature(&self, cursor: &mut Cursor<'_>, surface: &dyn SignatureSurface) {
        let layout = &self.config.layout;
        let labels = &self.config.labels;

        // Label and image move to the next page together
        cursor.reserve(layout.signature_label_advance + layout.signature_height);
        cursor.text(
            BlockRole::SignatureLabel,
            layout.heading_x,
            layout.task_font_size,
            labels.signature.clone(),
            layout.signature_label_advance,
        );

        let decoded = match surface.rasterize() {
            Ok(source) => self.decode(&source).await,
            Err(e) => Err(e),
        };
        match decoded {
            Ok(image) => {
                cursor.image(
                    BlockRole::Signature,
                    layout.heading_x,
                    layout.signature_width,
                    layout.signature_height,
                    image,
                );
            }
            Err(e) => {
                warn!("Signature could not be rendered: {}", e);
                cursor.reserve(layout.signature_height);
                let y = cursor.y + layout.line_advance;
                cursor.push(DrawInstruction::Text {
                    role: BlockRole::SignaturePlaceholder,
                    x: layout.heading_x,
                    y,
                    font_size: layout.comment_font_size,
                    text: labels.signature_placeholder.clone(),
                });
            }
        }
        cursor.advance(layout.signature_advance);
    }

    async fn decode(&self, source: &ImageSource) -> Result<DecodedImage, ChecklistError> {
        with_timeout(
            self.timer,
            self.config.decode_timeout(),
            self.decoder.decode(source),
        )
        .await?
    }
}

/// Vertical layout position on the current page
struct Cursor<'a> {
    config: &'a ReportConfig,
    y: f64,
    /// Whether anything was placed on the current page yet
    page_used: bool,
    instructions: Vec<DrawInstruction>,
}

impl<'a> Cursor<'a> {
    fn new(config: &'a ReportConfig) -> Self {
        Self {
            config,
            y: config.layout.top_margin,
            page_used: false,
            instructions: Vec::new(),
        }
    }

    fn advance(&mut self, by: f64) {
        self.y += by;
    }

    fn push(&mut self, instruction: DrawInstruction) {
        self.page_used = true;
        self.instructions.push(instruction);
    }

    fn page_break(&mut self) {
        self.instructions.push(DrawInstruction::PageBreak);
        self.y = self.config.layout.top_margin;
        self.page_used = false;
    }

    /// Under [`PaginationPolicy::PerBlock`], start a new page when a block of
    /// `height` would cross the threshold. An empty page always takes the block.
    fn reserve(&mut self, height: f64) {
        if self.config.pagination == PaginationPolicy::PerBlock
            && self.page_used
            && self.y + height > self.config.layout.page_break_threshold
        {
            self.page_break();
        }
    }

    fn text(&mut self, role: BlockRole, x: f64, font_size: f64, text: String, advance: f64) {
        self.reserve(advance);
        self.push(DrawInstruction::Text {
            role,
            x,
            y: self.y,
            font_size,
            text,
        });
        self.advance(advance);
    }

    fn image(&mut self, role: BlockRole, x: f64, width: f64, height: f64, image: DecodedImage) {
        self.reserve(height);
        self.push(DrawInstruction::Image {
            role,
            x,
            y: self.y,
            width,
            height,
            image,
        });
    }

    fn end_section(&mut self) {
        if self.y > self.config.layout.page_break_threshold {
            self.page_break();
        }
    }

    /// Footer sits at a fixed position and does not move the cursor
    fn footer(&mut self) {
        let layout = &self.config.layout;
        self.push(DrawInstruction::Text {
            role: BlockRole::Footer,
            x: layout.heading_x,
            y: layout.footer_y,
            font_size: layout.footer_font_size,
            text: self.config.labels.footer.clone(),
        });
    }

    fn finish(self) -> Report {
        Report {
            filename: self.config.filename.clone(),
            page_width: self.config.layout.page_width,
            page_height: self.config.layout.page_height,
            instructions: self.instructions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactMap, TaskArtifact};
    use crate::decoder::fixtures;
    use crate::decoder::NativeImageDecoder;
    use crate::model::Section;
    use crate::timer::NoTimer;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn checklist(sections: &[(&str, &[&str])]) -> Checklist {
        Checklist::new(
            sections
                .iter()
                .map(|(name, tasks)| Section::with_tasks(*name, tasks.iter().copied()))
                .collect(),
        )
    }

    async fn compile(
        config: &ReportConfig,
        input: ReportInput<'_>,
        locator: &dyn ArtifactLocator,
    ) -> Report {
        ReportCompiler::new(config, &NativeImageDecoder, &NoTimer)
            .compile(input, locator)
            .await
    }

    fn first_y(report: &Report, role: BlockRole) -> f64 {
        report.blocks(role).next().and_then(|b| b.y()).unwrap()
    }

    #[tokio::test]
    async fn test_concrete_scenario() {
        let checklist = checklist(&[("Test", &["A", "B"])]);
        let mut artifacts = ArtifactMap::new();
        artifacts.insert(
            checklist.sections()[0].tasks[0].id,
            TaskArtifact::completed().with_comment("fine"),
        );

        let config = ReportConfig::default();
        let report = compile(&config, ReportInput::new(&checklist), &artifacts).await;

        assert_eq!(
            report.lines(),
            vec![
                "Rapport quotidien NovaCheck",
                "Test",
                "- A: OK",
                "Commentaire: fine",
                "- B: KO",
                "NovaCheck est créé par la société NovaSoft, appartenant au groupe Berry&Co.",
            ]
        );
        assert_eq!(report.filename, "rapport_novacheck.pdf");
        assert_eq!(report.page_count(), 1);
    }

    #[tokio::test]
    async fn test_block_positions() {
        let checklist = checklist(&[("Test", &["A", "B"])]);
        let mut artifacts = ArtifactMap::new();
        artifacts.insert_at(0, 0, TaskArtifact::completed().with_comment("fine"));

        let config = ReportConfig::default();
        let report = compile(&config, ReportInput::new(&checklist), &artifacts).await;

        let positions: Vec<(BlockRole, f64, f64)> = report
            .instructions
            .iter()
            .filter_map(|i| match i {
                DrawInstruction::Text { role, x, y, .. } => Some((*role, *x, *y)),
                _ => None,
            })
            .collect();
        assert_eq!(
            positions,
            vec![
                (BlockRole::Title, 20.0, 20.0),
                (BlockRole::SectionHeading, 20.0, 32.0),
                (BlockRole::TaskStatus, 25.0, 40.0),
                (BlockRole::Comment, 30.0, 46.0),
                (BlockRole::TaskStatus, 25.0, 52.0),
                (BlockRole::Footer, 20.0, 285.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_heading_and_status_counts() {
        let checklist = Checklist::default_inspection();
        let config = ReportConfig::default();
        let report = compile(&config, ReportInput::new(&checklist), &ArtifactMap::new()).await;

        assert_eq!(report.blocks(BlockRole::SectionHeading).count(), checklist.len());
        assert_eq!(report.blocks(BlockRole::TaskStatus).count(), checklist.task_count());
        assert_eq!(report.blocks(BlockRole::Comment).count(), 0);
        assert!(report
            .blocks(BlockRole::TaskStatus)
            .all(|b| b.text().is_some_and(|t| t.ends_with(": KO"))));
    }

    #[tokio::test]
    async fn test_whitespace_comment_emits_nothing() {
        let checklist = checklist(&[("S", &["A"])]);
        let mut artifacts = ArtifactMap::new();
        artifacts.insert_at(0, 0, TaskArtifact::new(true, "   ", []));
        let config = ReportConfig::default();
        let report = compile(&config, ReportInput::new(&checklist), &artifacts).await;
        assert_eq!(report.blocks(BlockRole::Comment).count(), 0);
    }

    #[tokio::test]
    async fn test_photo_keeps_aspect_ratio() {
        let checklist = checklist(&[("S", &["A", "B"])]);
        let mut artifacts = ArtifactMap::new();
        artifacts.insert_at(
            0,
            0,
            TaskArtifact::default().with_photo(ImageSource::Bytes(fixtures::png(40, 30))),
        );

        let config = ReportConfig::default();
        let report = compile(&config, ReportInput::new(&checklist), &artifacts).await;

        let photos: Vec<_> = report.blocks(BlockRole::Photo).collect();
        assert_eq!(photos.len(), 1);
        match photos[0] {
            DrawInstruction::Image {
                x, y, width, height, ..
            } => {
                assert_eq!((*x, *y), (30.0, 46.0));
                assert_eq!(*width, 60.0);
                assert_eq!(*height, 45.0);
            }
            other => panic!("expected image, got {:?}", other),
        }
        // Next task starts below the photo and its gap
        let second = report.blocks(BlockRole::TaskStatus).nth(1).unwrap();
        assert_eq!(second.y(), Some(46.0 + 45.0 + 4.0));
    }

    #[tokio::test]
    async fn test_corrupt_photo_becomes_placeholder() {
        let checklist = checklist(&[("S", &["A", "B"])]);
        let mut artifacts = ArtifactMap::new();
        artifacts.insert_at(
            0,
            0,
            TaskArtifact::default().with_photo(ImageSource::Bytes(b"garbage".to_vec())),
        );
        artifacts.insert_at(0, 1, TaskArtifact::completed());

        let config = ReportConfig::default();
        let report = compile(&config, ReportInput::new(&checklist), &artifacts).await;

        assert_eq!(report.blocks(BlockRole::Photo).count(), 0);
        assert_eq!(
            report.lines(),
            vec![
                "Rapport quotidien NovaCheck",
                "S",
                "- A: KO",
                "[Photo illisible]",
                "- B: OK",
                "NovaCheck est créé par la société NovaSoft, appartenant au groupe Berry&Co.",
            ]
        );
    }

    #[tokio::test]
    async fn test_logo_is_first_block() {
        let checklist = checklist(&[("S", &["A"])]);
        let config = ReportConfig::default();
        let input =
            ReportInput::new(&checklist).with_logo(Some(ImageSource::Bytes(fixtures::png(80, 20))));
        let report = compile(&config, input, &ArtifactMap::new()).await;

        match &report.instructions[0] {
            DrawInstruction::Image {
                role,
                y,
                width,
                height,
                ..
            } => {
                assert_eq!(*role, BlockRole::Logo);
                assert_eq!(*y, 20.0);
                assert_eq!(*width, 40.0);
                assert_eq!(*height, 10.0);
            }
            other => panic!("expected logo, got {:?}", other),
        }
        assert_eq!(first_y(&report, BlockRole::Title), 20.0 + 10.0 + 5.0);
    }

    #[tokio::test]
    async fn test_title_first_without_logo() {
        let checklist = checklist(&[("S", &["A"])]);
        let config = ReportConfig::default();
        let report = compile(&config, ReportInput::new(&checklist), &ArtifactMap::new()).await;
        assert_eq!(report.instructions[0].role(), Some(BlockRole::Title));
        assert_eq!(report.instructions[0].y(), Some(20.0));
    }

    #[tokio::test]
    async fn test_bad_logo_is_skipped() {
        let checklist = checklist(&[("S", &["A"])]);
        let config = ReportConfig::default();
        let input = ReportInput::new(&checklist)
            .with_logo(Some(ImageSource::DataUrl("data:image/png;base64,AAAA".into())));
        let report = compile(&config, input, &ArtifactMap::new()).await;
        assert_eq!(report.blocks(BlockRole::Logo).count(), 0);
        assert_eq!(report.instructions[0].role(), Some(BlockRole::Title));
        assert_eq!(report.instructions[0].y(), Some(20.0));
    }

    /// Sections of 40 tasks each overflow the threshold on their own
    fn long_checklist(sections: usize) -> Checklist {
        Checklist::new(
            (0..sections)
                .map(|s| {
                    Section::with_tasks(format!("Section {}", s), (0..40).map(|t| format!("T{}", t)))
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_page_break_between_sections() {
        let checklist = long_checklist(2);
        let config = ReportConfig::default();
        let report = compile(&config, ReportInput::new(&checklist), &ArtifactMap::new()).await;

        // 32 + 8 + 40 * 6 + 4 = 284 > 260 after each section
        assert_eq!(report.page_count(), 3);
        let pages = report.pages();
        assert_eq!(pages[1][0].role(), Some(BlockRole::SectionHeading));
        assert_eq!(pages[1][0].y(), Some(20.0));
        // Section content itself is not split
        assert_eq!(
            pages[0]
                .iter()
                .filter(|b| b.role() == Some(BlockRole::TaskStatus))
                .count(),
            40
        );
    }

    #[tokio::test]
    async fn test_footer_only_on_last_page() {
        let checklist = long_checklist(2);
        let config = ReportConfig::default();
        let report = compile(&config, ReportInput::new(&checklist), &ArtifactMap::new()).await;

        let pages = report.pages();
        let last = pages.len() - 1;
        for (index, page) in pages.iter().enumerate() {
            let footers = page
                .iter()
                .filter(|b| b.role() == Some(BlockRole::Footer))
                .count();
            assert_eq!(footers, usize::from(index == last));
        }
        assert_eq!(first_y(&report, BlockRole::Footer), 285.0);
    }

    #[tokio::test]
    async fn test_per_block_pagination() {
        let checklist = long_checklist(1);
        let config = ReportConfig {
            pagination: PaginationPolicy::PerBlock,
            ..ReportConfig::default()
        };
        let report = compile(&config, ReportInput::new(&checklist), &ArtifactMap::new()).await;

        assert!(report.page_count() >= 2);
        for page in report.pages() {
            for block in page {
                if block.role() == Some(BlockRole::TaskStatus) {
                    assert!(block.y().unwrap() + 6.0 <= 260.0);
                }
            }
        }
        assert_eq!(report.pages()[1][0].y(), Some(20.0));
    }

    struct CountingSurface {
        calls: RefCell<usize>,
        source: Result<ImageSource, ChecklistError>,
    }

    impl SignatureSurface for CountingSurface {
        fn rasterize(&self) -> Result<ImageSource, ChecklistError> {
            *self.calls.borrow_mut() += 1;
            self.source.clone()
        }
    }

    #[tokio::test]
    async fn test_signature_block() {
        let checklist = checklist(&[("S", &["A"])]);
        let surface = CountingSurface {
            calls: RefCell::new(0),
            source: Ok(ImageSource::Bytes(fixtures::png(300, 100))),
        };
        let config = ReportConfig::default();
        let input = ReportInput::new(&checklist).with_signature(&surface);
        let report = compile(&config, input, &ArtifactMap::new()).await;

        assert_eq!(*surface.calls.borrow(), 1);
        // Task line at 40, section gap: 50
        assert_eq!(first_y(&report, BlockRole::SignatureLabel), 50.0);
        match report.blocks(BlockRole::Signature).next() {
            Some(DrawInstruction::Image {
                y, width, height, ..
            }) => {
                assert_eq!(*y, 54.0);
                assert_eq!((*width, *height), (60.0, 20.0));
            }
            other => panic!("expected signature image, got {:?}", other),
        };
    }

    #[tokio::test]
    async fn test_signature_label_stays_with_image() {
        // 33 tasks leave the cursor at 242: room for the label, not the image
        let tasks: Vec<String> = (0..33).map(|t| format!("T{}", t)).collect();
        let checklist = Checklist::new(vec![Section::with_tasks("S", tasks)]);
        let surface = CountingSurface {
            calls: RefCell::new(0),
            source: Ok(ImageSource::Bytes(fixtures::png(300, 100))),
        };
        let config = ReportConfig {
            pagination: PaginationPolicy::PerBlock,
            ..ReportConfig::default()
        };
        let input = ReportInput::new(&checklist).with_signature(&surface);
        let report = compile(&config, input, &ArtifactMap::new()).await;

        let pages = report.pages();
        assert_eq!(pages.len(), 2);
        let roles: Vec<_> = pages[1].iter().filter_map(|b| b.role()).collect();
        assert_eq!(
            roles,
            vec![BlockRole::SignatureLabel, BlockRole::Signature, BlockRole::Footer]
        );
        assert_eq!(first_y(&report, BlockRole::SignatureLabel), 20.0);
        assert_eq!(first_y(&report, BlockRole::Signature), 24.0);
    }

    #[tokio::test]
    async fn test_signature_failure_becomes_placeholder() {
        let checklist = checklist(&[("S", &["A"])]);
        let surface = CountingSurface {
            calls: RefCell::new(0),
            source: Err(ChecklistError::ImageDecode("canvas tainted".into())),
        };
        let config = ReportConfig::default();
        let input = ReportInput::new(&checklist).with_signature(&surface);
        let report = compile(&config, input, &ArtifactMap::new()).await;

        assert_eq!(report.blocks(BlockRole::Signature).count(), 0);
        assert_eq!(report.blocks(BlockRole::SignaturePlaceholder).count(), 1);
        assert_eq!(report.blocks(BlockRole::Footer).count(), 1);
    }

    #[cfg(feature = "native")]
    struct StalledDecoder;

    #[cfg(feature = "native")]
    #[async_trait(?Send)]
    impl ImageDecoder for StalledDecoder {
        async fn decode(&self, _source: &ImageSource) -> Result<DecodedImage, ChecklistError> {
            futures::future::pending().await
        }
    }

    #[cfg(feature = "native")]
    #[tokio::test]
    async fn test_stalled_decode_times_out() {
        let checklist = checklist(&[("S", &["A"])]);
        let mut artifacts = ArtifactMap::new();
        artifacts.insert_at(
            0,
            0,
            TaskArtifact::default().with_photo(ImageSource::Bytes(vec![0])),
        );
        let config = ReportConfig {
            decode_timeout_ms: Some(5),
            ..ReportConfig::default()
        };
        let report = ReportCompiler::new(&config, &StalledDecoder, &crate::timer::TokioTimer)
            .compile(ReportInput::new(&checklist), &artifacts)
            .await;
        assert_eq!(report.blocks(BlockRole::PhotoPlaceholder).count(), 1);
    }

    /// Records decode order to check photos are processed in checklist order
    struct RecordingDecoder {
        seen: RefCell<Vec<usize>>,
    }

    #[async_trait(?Send)]
    impl ImageDecoder for RecordingDecoder {
        async fn decode(&self, source: &ImageSource) -> Result<DecodedImage, ChecklistError> {
            let bytes = source.to_bytes().await?;
            self.seen.borrow_mut().push(bytes.len());
            NativeImageDecoder::decode_bytes(fixtures::png(10, 10))
        }
    }

    #[tokio::test]
    async fn test_photos_decoded_in_checklist_order() {
        let checklist = checklist(&[("S1", &["A", "B"]), ("S2", &["C"])]);
        let mut artifacts = ArtifactMap::new();
        artifacts.insert_at(1, 0, TaskArtifact::default().with_photo(ImageSource::Bytes(vec![0; 3])));
        artifacts.insert_at(0, 1, TaskArtifact::default().with_photo(ImageSource::Bytes(vec![0; 2])));
        artifacts.insert_at(0, 0, TaskArtifact::default().with_photo(ImageSource::Bytes(vec![0; 1])));

        let decoder = RecordingDecoder {
            seen: RefCell::new(Vec::new()),
        };
        let config = ReportConfig::default();
        let report = ReportCompiler::new(&config, &decoder, &NoTimer)
            .compile(ReportInput::new(&checklist), &artifacts)
            .await;

        assert_eq!(*decoder.seen.borrow(), vec![1, 2, 3]);
        assert_eq!(report.blocks(BlockRole::Photo).count(), 3);
    }
}
