//! # mergereportpdf
//!
//! Collects PDF report attachments from a mailbox folder, groups them by the
//! naming convention embedded in their filenames, merges each group into one
//! page-numbered document and hands it to a mail composer.
//!
//! ## What this crate does
//!
//! 1. **Parse filenames**: `"{frequency} Sec|Appendix {part} {region}"` is
//!    decoded into a [`ParsedFilename`].
//! 2. **Group**: items sharing `(frequency, region)` form one [`MergeGroup`],
//!    in a deterministic order.
//! 3. **Merge**: the group's documents are concatenated page by page into a
//!    [`MergedDocument`], preserving every page's geometry.
//! 4. **Paginate**: a [`NumberedOverlay`] of blank, numbered pages is
//!    composited onto the merged document.
//! 5. **Distribute**: the [`Distributor`] resolves recipients and composes a
//!    draft per group, isolating failures to the group that caused them.
//!
//! ## Quick example
//!
//! ```
//! use mergereportpdf::{group, parse, DocumentKind, SourceItem};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let parsed = parse("Monthly Sec 1 EMEA.pdf")?;
//! assert_eq!(parsed.kind, DocumentKind::Section);
//! assert_eq!(parsed.merged_filename(), "Monthly EMEA.pdf");
//!
//! let items = vec![
//!     SourceItem::new(parse("Weekly Sec 1 APAC.pdf")?, "m1.msg", 1),
//!     SourceItem::new(parse("Monthly Sec 1 EMEA.pdf")?, "m2.msg", 1),
//!     SourceItem::new(parse("Monthly Appendix 1 EMEA.pdf")?, "m2.msg", 2),
//! ];
//! let groups = group(items);
//! assert_eq!(groups.len(), 2);
//! assert_eq!(groups[0].merged_filename(), "Weekly APAC.pdf");
//! assert_eq!(groups[1].len(), 2);
//! # Ok(())
//! # }
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod composer;
mod directory;
mod distributor;
mod filename;
mod grouping;
mod merge;
mod overlay;
mod pdf_utils;
pub mod storage;
mod store;

pub use composer::{build_message, DistributionRecord, MailComposer, OutboxComposer};
pub use directory::{RecipientDirectory, Recipients, TomlRecipientDirectory};
pub use distributor::{
    received_since, scan_folder, select, DistributedGroup, Distributor, RunSummary, Scan,
    SkipKind, SkippedGroup, SkippedItem,
};
pub use filename::{parse, DocumentKind, ParsedFilename};
pub use grouping::{group, MergeGroup, SourceItem};
pub use merge::{merge, MergedDocument};
pub use overlay::{apply_overlay, build_overlay, page_sizes, NumberedOverlay, PageSize};
pub use store::{AttachmentEntry, DirectoryMessageStore, FolderNode, FolderRef, MessageStore};

// ── Configuration ────────────────────────────────────────────────────────────

/// Fixed typography of the page-number overlay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageNumberStyle {
    /// One of the standard base-14 font names (e.g. `"Helvetica"`).
    pub font: String,

    /// Font size in points.
    pub font_size: f32,

    /// Distance in points from the bottom edge of the page to the baseline
    /// of the number.
    pub bottom_margin: f32,
}

impl Default for PageNumberStyle {
    fn default() -> Self {
        Self {
            font: "Helvetica".into(),
            font_size: 10.0,
            bottom_margin: 20.0,
        }
    }
}

/// Runtime configuration for a [`Distributor`] run.
///
/// Templates may use the `{frequency}`, `{region}` and `{addressee}`
/// placeholders.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DistributorConfig {
    /// Save folder for the merged, numbered documents.
    pub output_directory: PathBuf,

    /// Typography of the page numbers.
    pub page_numbers: PageNumberStyle,

    /// `From` mailbox of each composed draft, e.g. `"Reports <reports@example.com>"`.
    pub sender: String,

    /// Subject line of each composed draft.
    pub subject_template: String,

    /// Body text of each composed draft.
    pub body_template: String,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("merged"),
            page_numbers: PageNumberStyle::default(),
            sender: "reports@example.com".into(),
            subject_template: "{frequency} {region} report".into(),
            body_template: "Dear {addressee},\n\nPlease find attached the {frequency} report for {region}.\n".into(),
        }
    }
}

impl DistributorConfig {
    /// Parse a configuration from TOML text. Missing keys take their default.
    ///
    /// ```
    /// use mergereportpdf::DistributorConfig;
    ///
    /// let cfg = DistributorConfig::from_toml_str(r#"
    ///     output_directory = "out"
    ///     [page_numbers]
    ///     font_size = 12.0
    /// "#).unwrap();
    /// assert_eq!(cfg.output_directory.to_str(), Some("out"));
    /// assert_eq!(cfg.page_numbers.font, "Helvetica");
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ReportError::ConfigError(e.to_string()))
    }

    /// Load a configuration file from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Every error that this crate can produce.
#[derive(Error, Debug)]
pub enum ReportError {
    /// A filesystem I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The underlying lopdf parser returned an error.
    #[error("PDF parse error: {0}")]
    ParseError(#[from] lopdf::Error),

    /// The input bytes do not form a usable PDF document.
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// The filename carries a `Sec`/`Appendix` marker but the fields around it
    /// cannot be extracted.
    #[error("Malformed filename '{filename}': {reason}")]
    MalformedFilename { filename: String, reason: String },

    /// A source attachment could not be fetched or read.
    #[error("Source '{item}' unavailable: {reason}")]
    SourceUnavailable { item: String, reason: String },

    /// The overlay and the document it is applied to disagree on page count.
    #[error("Page count mismatch: document has {base} page(s), overlay has {overlay}")]
    PageCountMismatch { base: usize, overlay: usize },

    /// A document or draft could not be written to its final location.
    #[error("Failed to store '{path}': {reason}")]
    StorageError { path: PathBuf, reason: String },

    /// A configuration or recipient file could not be understood.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A draft could not be built, e.g. because of an invalid address.
    #[error("Mail error: {0}")]
    MailError(String),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ReportError>;
