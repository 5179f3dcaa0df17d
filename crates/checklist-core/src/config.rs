//! Report and storage configuration
//!
//! All lengths are millimetres on the output page, with the y axis growing
//! downward from the top edge. Every struct deserializes with defaults for
//! missing fields so callers can override only what they need.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChecklistError;

/// When the compiler is allowed to start a new page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationPolicy {
    /// Break only between sections, once the cursor passed the threshold.
    /// A long section may run past the bottom of its page.
    #[default]
    SectionBoundary,
    /// Additionally break before any block that would cross the threshold
    PerBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub page_width: f64,
    pub page_height: f64,
    pub top_margin: f64,
    /// Cursor position past which a new page is started
    pub page_break_threshold: f64,

    pub heading_x: f64,
    pub task_x: f64,
    pub detail_x: f64,

    pub title_font_size: f64,
    pub section_font_size: f64,
    pub task_font_size: f64,
    pub comment_font_size: f64,
    pub footer_font_size: f64,

    pub title_advance: f64,
    pub section_advance: f64,
    pub line_advance: f64,
    pub section_gap: f64,

    pub logo_width: f64,
    pub logo_gap: f64,
    pub photo_width: f64,
    pub photo_gap: f64,

    pub signature_label_advance: f64,
    pub signature_width: f64,
    pub signature_height: f64,
    pub signature_advance: f64,

    pub footer_y: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            page_width: 210.0,
            page_height: 297.0,
            top_margin: 20.0,
            page_break_threshold: 260.0,
            heading_x: 20.0,
            task_x: 25.0,
            detail_x: 30.0,
            title_font_size: 18.0,
            section_font_size: 14.0,
            task_font_size: 12.0,
            comment_font_size: 10.0,
            footer_font_size: 8.0,
            title_advance: 12.0,
            section_advance: 8.0,
            line_advance: 6.0,
            section_gap: 4.0,
            logo_width: 40.0,
            logo_gap: 5.0,
            photo_width: 60.0,
            photo_gap: 4.0,
            signature_label_advance: 4.0,
            signature_width: 60.0,
            signature_height: 20.0,
            signature_advance: 30.0,
            footer_y: 285.0,
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), ChecklistError> {
        if self.page_width <= 0.0 || self.page_height <= 0.0 {
            return Err(ChecklistError::Config(
                "page dimensions must be positive".to_string(),
            ));
        }
        for (name, width) in [
            ("logo_width", self.logo_width),
            ("photo_width", self.photo_width),
            ("signature_width", self.signature_width),
        ] {
            if width <= 0.0 {
                return Err(ChecklistError::Config(format!("{} must be positive", name)));
            }
        }
        if self.top_margin < 0.0 || self.top_margin >= self.page_break_threshold {
            return Err(ChecklistError::Config(format!(
                "top margin {} must lie between 0 and the page break threshold {}",
                self.top_margin, self.page_break_threshold
            )));
        }
        if self.page_break_threshold > self.page_height {
            return Err(ChecklistError::Config(format!(
                "page break threshold {} exceeds page height {}",
                self.page_break_threshold, self.page_height
            )));
        }
        Ok(())
    }
}

/// Fixed report wording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportLabels {
    pub title: String,
    pub completed: String,
    pub not_completed: String,
    pub comment_prefix: String,
    pub signature: String,
    pub photo_placeholder: String,
    pub signature_placeholder: String,
    pub footer: String,
}

impl Default for ReportLabels {
    fn default() -> Self {
        Self {
            title: "Rapport quotidien NovaCheck".to_string(),
            completed: "OK".to_string(),
            not_completed: "KO".to_string(),
            comment_prefix: "Commentaire".to_string(),
            signature: "Signature:".to_string(),
            photo_placeholder: "[Photo illisible]".to_string(),
            signature_placeholder: "[Signature illisible]".to_string(),
            footer: "NovaCheck est créé par la société NovaSoft, appartenant au groupe Berry&Co."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub layout: LayoutConfig,
    pub labels: ReportLabels,
    pub pagination: PaginationPolicy,
    /// Upper bound for a single image decode; `None` waits forever
    pub decode_timeout_ms: Option<u64>,
    pub filename: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            labels: ReportLabels::default(),
            pagination: PaginationPolicy::default(),
            decode_timeout_ms: Some(10_000),
            filename: "rapport_novacheck.pdf".to_string(),
        }
    }
}

impl ReportConfig {
    /// Parse a (possibly partial) JSON override
    pub fn from_json(json: &str) -> Result<Self, ChecklistError> {
        let config: ReportConfig =
            serde_json::from_str(json).map_err(|e| ChecklistError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChecklistError> {
        if self.filename.trim().is_empty() {
            return Err(ChecklistError::Config("filename must not be empty".to_string()));
        }
        self.layout.validate()
    }

    pub fn decode_timeout(&self) -> Option<Duration> {
        self.decode_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Namespace prepended to every storage key
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: "novacheck_".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn sections_key(&self) -> String {
        format!("{}sections", self.key_prefix)
    }

    pub fn logo_key(&self) -> String {
        format!("{}logo", self.key_prefix)
    }
}
