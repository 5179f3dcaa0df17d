//! Report drawing instructions
//!
//! A [`Report`] is a flat, ordered list of positioned blocks separated by page
//! breaks. Coordinates are millimetres from the top-left corner of the page;
//! for text, `y` is the baseline.

mod compiler;

pub use compiler::{ReportCompiler, ReportInput};

use crate::decoder::DecodedImage;

/// What a block represents in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockRole {
    Logo,
    Title,
    SectionHeading,
    TaskStatus,
    Comment,
    Photo,
    PhotoPlaceholder,
    SignatureLabel,
    Signature,
    SignaturePlaceholder,
    Footer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawInstruction {
    Text {
        role: BlockRole,
        x: f64,
        y: f64,
        font_size: f64,
        text: String,
    },
    Image {
        role: BlockRole,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        image: DecodedImage,
    },
    PageBreak,
}

impl DrawInstruction {
    pub fn role(&self) -> Option<BlockRole> {
        match self {
            DrawInstruction::Text { role, .. } | DrawInstruction::Image { role, .. } => Some(*role),
            DrawInstruction::PageBreak => None,
        }
    }

    /// Top coordinate of the block
    pub fn y(&self) -> Option<f64> {
        match self {
            DrawInstruction::Text { y, .. } | DrawInstruction::Image { y, .. } => Some(*y),
            DrawInstruction::PageBreak => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            DrawInstruction::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Compiled report, ready to be rendered
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub filename: String,
    pub page_width: f64,
    pub page_height: f64,
    pub instructions: Vec<DrawInstruction>,
}

impl Report {
    /// Blocks grouped per page
    pub fn pages(&self) -> Vec<Vec<&DrawInstruction>> {
        let mut pages = vec![Vec::new()];
        for instruction in &self.instructions {
            match instruction {
                DrawInstruction::PageBreak => pages.push(Vec::new()),
                block => {
                    if let Some(page) = pages.last_mut() {
                        page.push(block);
                    }
                }
            }
        }
        pages
    }

    pub fn page_count(&self) -> usize {
        1 + self
            .instructions
            .iter()
            .filter(|i| matches!(i, DrawInstruction::PageBreak))
            .count()
    }

    /// Blocks with the given role, in emission order
    pub fn blocks(&self, role: BlockRole) -> impl Iterator<Item = &DrawInstruction> {
        self.instructions
            .iter()
            .filter(move |i| i.role() == Some(role))
    }

    /// All text lines, in emission order
    pub fn lines(&self) -> Vec<&str> {
        self.instructions.iter().filter_map(|i| i.text()).collect()
    }
}
