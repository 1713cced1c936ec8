use crate::overlay::{apply_overlay, build_overlay, page_sizes};
use crate::{
    group, merge, parse, storage, DistributionRecord, DistributorConfig, FolderRef, MailComposer,
    MergeGroup, MergedDocument, MessageStore, RecipientDirectory, Recipients, ReportError, Result,
    SourceItem,
};
use chrono::NaiveDate;
use lopdf::Document;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

// ── Outcome types ────────────────────────────────────────────────────────────

/// Why an item or a group was left out of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipKind {
    /// The filename carries a marker but its fields could not be extracted.
    MalformedFilename,
    /// The filename carries neither the `Sec` nor the `Appendix` marker.
    Unrecognized,
    /// An attachment could not be fetched or read.
    SourceUnavailable,
    /// An attachment is not a usable PDF.
    InvalidSource,
    /// Another group of the run already produces a document of that name.
    NameCollision,
    /// The numbering overlay did not fit the merged document.
    PageCountMismatch,
    /// No mailing list matches the group's report and team.
    NoRecipientMatch,
    /// The recipient directory could not be queried.
    DirectoryFailure,
    /// A document could not be written to the save folder.
    StorageFailure,
    /// The mail composer rejected the draft.
    ComposeFailure,
}

impl SkipKind {
    fn from_error(error: &ReportError) -> Self {
        match error {
            ReportError::MalformedFilename { .. } => SkipKind::MalformedFilename,
            ReportError::SourceUnavailable { .. } => SkipKind::SourceUnavailable,
            ReportError::InvalidPdf(_) | ReportError::ParseError(_) => SkipKind::InvalidSource,
            ReportError::PageCountMismatch { .. } => SkipKind::PageCountMismatch,
            ReportError::ConfigError(_) => SkipKind::DirectoryFailure,
            ReportError::IoError(_) | ReportError::StorageError { .. } => SkipKind::StorageFailure,
            ReportError::MailError(_) => SkipKind::ComposeFailure,
        }
    }
}

impl fmt::Display for SkipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipKind::MalformedFilename => "malformed filename",
            SkipKind::Unrecognized => "unrecognised filename",
            SkipKind::SourceUnavailable => "source unavailable",
            SkipKind::InvalidSource => "invalid source PDF",
            SkipKind::NameCollision => "output name collision",
            SkipKind::PageCountMismatch => "page count mismatch",
            SkipKind::NoRecipientMatch => "no recipient match",
            SkipKind::DirectoryFailure => "recipient directory failure",
            SkipKind::StorageFailure => "storage failure",
            SkipKind::ComposeFailure => "compose failure",
        })
    }
}

/// An attachment left out before grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub filename: String,
    pub kind: SkipKind,
    pub detail: String,
}

/// A merge group that did not reach the mail composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedGroup {
    /// `"{frequency}/{region}"`.
    pub group: String,
    pub kind: SkipKind,
    pub detail: String,
    /// Document left in the save folder, if the group got that far.
    pub artifact: Option<PathBuf>,
}

/// A group whose numbered document was handed to the mail composer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributedGroup {
    pub group: String,
    pub path: PathBuf,
    pub source_count: usize,
    pub page_count: usize,
    pub recipients: Recipients,
}

/// Everything that happened during one [`Distributor::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub distributed: Vec<DistributedGroup>,
    pub skipped_items: Vec<SkippedItem>,
    pub skipped_groups: Vec<SkippedGroup>,
}

impl RunSummary {
    /// `true` when nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.skipped_items.is_empty() && self.skipped_groups.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} document(s) distributed", self.distributed.len())?;
        for done in &self.distributed {
            writeln!(
                f,
                "  • {}: {} source(s), {} page(s) → {}",
                done.group,
                done.source_count,
                done.page_count,
                done.path.display()
            )?;
        }
        if !self.skipped_items.is_empty() {
            writeln!(f, "{} item(s) skipped", self.skipped_items.len())?;
            for item in &self.skipped_items {
                writeln!(f, "  • {} ({}): {}", item.filename, item.kind, item.detail)?;
            }
        }
        if !self.skipped_groups.is_empty() {
            writeln!(f, "{} group(s) skipped", self.skipped_groups.len())?;
            for skipped in &self.skipped_groups {
                write!(f, "  • {} ({}): {}", skipped.group, skipped.kind, skipped.detail)?;
                match &skipped.artifact {
                    Some(path) => writeln!(f, " [kept {}]", path.display())?,
                    None => writeln!(f)?,
                }
            }
        }
        Ok(())
    }
}

// ── Scanning and selection ───────────────────────────────────────────────────

/// The parsed PDF attachments of one folder.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    /// Attachments whose filename follows the convention.
    pub items: Vec<SourceItem>,
    /// Attachments left out, with the reason.
    pub skipped: Vec<SkippedItem>,
}

/// List the PDF attachments of `folder` and parse their filenames.
///
/// A malformed or unrecognised filename skips that attachment only.
pub fn scan_folder(store: &dyn MessageStore, folder: &FolderRef) -> Result<Scan> {
    let mut scan = Scan::default();

    for entry in store.list_attachments(folder)? {
        match parse(&entry.filename) {
            Ok(parsed) if parsed.is_recognized() => {
                scan.items.push(
                    SourceItem::new(parsed, entry.message_ref, entry.attachment_index)
                        .with_received(entry.received),
                );
            }
            Ok(_) => {
                log::warn!("skipping '{}': no Sec/Appendix marker", entry.filename);
                scan.skipped.push(SkippedItem {
                    filename: entry.filename,
                    kind: SkipKind::Unrecognized,
                    detail: "no Sec/Appendix marker".into(),
                });
            }
            Err(e) => {
                log::warn!("skipping '{}': {}", entry.filename, e);
                scan.skipped.push(SkippedItem {
                    filename: entry.filename,
                    kind: SkipKind::from_error(&e),
                    detail: e.to_string(),
                });
            }
        }
    }

    Ok(scan)
}

/// Keep the items whose filename contains any of `patterns`; with no
/// patterns every item is kept.
pub fn select(items: Vec<SourceItem>, patterns: &[String]) -> Vec<SourceItem> {
    if patterns.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| patterns.iter().any(|p| item.filename().contains(p.as_str())))
        .collect()
}

/// Keep the items received on or after `since`. Items with no known
/// received date are dropped.
pub fn received_since(items: Vec<SourceItem>, since: NaiveDate) -> Vec<SourceItem> {
    let (kept, dropped): (Vec<_>, Vec<_>) = items
        .into_iter()
        .partition(|item| item.received.map_or(false, |day| day >= since));
    if !dropped.is_empty() {
        log::debug!("{} item(s) received before {since}", dropped.len());
    }
    kept
}

// ── Distributor ──────────────────────────────────────────────────────────────

/// Drives merge groups through merge, pagination, recipient lookup and
/// draft composition, one group at a time.
///
/// A failing group is recorded in the [`RunSummary`] and never stops the
/// groups after it.
pub struct Distributor<'a> {
    store: &'a dyn MessageStore,
    directory: &'a dyn RecipientDirectory,
    composer: &'a mut dyn MailComposer,
    config: &'a DistributorConfig,
}

impl<'a> Distributor<'a> {
    pub fn new(
        store: &'a dyn MessageStore,
        directory: &'a dyn RecipientDirectory,
        composer: &'a mut dyn MailComposer,
        config: &'a DistributorConfig,
    ) -> Self {
        Self {
            store,
            directory,
            composer,
            config,
        }
    }

    /// Group `items` and distribute every group.
    pub fn run(&mut self, items: Vec<SourceItem>) -> RunSummary {
        let mut summary = RunSummary::default();

        for item in items.iter().filter(|item| !item.parsed_name.is_recognized()) {
            log::warn!("skipping '{}': no Sec/Appendix marker", item.filename());
            summary.skipped_items.push(SkippedItem {
                filename: item.filename().to_string(),
                kind: SkipKind::Unrecognized,
                detail: "no Sec/Appendix marker".into(),
            });
        }

        // Output names that differ only in case would share one file on
        // case-insensitive file systems.
        let mut claimed: HashMap<String, String> = HashMap::new();
        for merge_group in group(items) {
            let name = merge_group.merged_filename();
            if let Some(owner) = claimed.get(&name.to_lowercase()) {
                let skipped = SkippedGroup {
                    group: merge_group.to_string(),
                    kind: SkipKind::NameCollision,
                    detail: format!("'{name}' is already written by group {owner}"),
                    artifact: None,
                };
                log::warn!("skipping group {}: {}: {}", skipped.group, skipped.kind, skipped.detail);
                summary.skipped_groups.push(skipped);
                continue;
            }
            claimed.insert(name.to_lowercase(), merge_group.to_string());

            match self.process_group(&merge_group) {
                Ok(done) => summary.distributed.push(done),
                Err(skipped) => {
                    log::warn!(
                        "skipping group {}: {}: {}",
                        skipped.group,
                        skipped.kind,
                        skipped.detail
                    );
                    summary.skipped_groups.push(skipped);
                }
            }
        }

        summary
    }

    fn process_group(&mut self, merge_group: &MergeGroup) -> std::result::Result<DistributedGroup, SkippedGroup> {
        let skip = |kind: SkipKind, detail: String, artifact: Option<PathBuf>| SkippedGroup {
            group: merge_group.to_string(),
            kind,
            detail,
            artifact,
        };

        // Merged, un-numbered document first; the numbered one replaces it.
        let merged = self
            .merge_group(merge_group)
            .map_err(|e| skip(SkipKind::from_error(&e), e.to_string(), None))?;
        let path = merged
            .save_atomic(&self.config.output_directory)
            .map_err(|e| skip(SkipKind::StorageFailure, e.to_string(), None))?;

        let numbered = self
            .paginate(&merged.document)
            .map_err(|e| skip(SkipKind::from_error(&e), e.to_string(), Some(path.clone())))?;
        storage::save_document(&numbered, &path)
            .map_err(|e| skip(SkipKind::StorageFailure, e.to_string(), Some(path.clone())))?;
        let page_count = merged.page_count();
        log::info!(
            "wrote {} ({} source(s), {} page(s))",
            path.display(),
            merge_group.len(),
            page_count
        );

        let recipients = match self
            .directory
            .lookup(merge_group.frequency(), merge_group.region_stem())
        {
            Ok(Some(recipients)) => recipients,
            Ok(None) => {
                return Err(skip(
                    SkipKind::NoRecipientMatch,
                    format!(
                        "no mailing list for report '{}' and team '{}'",
                        merge_group.frequency(),
                        merge_group.region_stem()
                    ),
                    Some(path),
                ))
            }
            Err(e) => return Err(skip(SkipKind::DirectoryFailure, e.to_string(), Some(path))),
        };

        let record = DistributionRecord {
            sender: self.config.sender.clone(),
            subject: self.render(&self.config.subject_template, merge_group, &recipients),
            body: self.render(&self.config.body_template, merge_group, &recipients),
            recipients,
            attachment: path.clone(),
        };
        self.composer
            .compose(&record)
            .map_err(|e| skip(SkipKind::ComposeFailure, e.to_string(), Some(path.clone())))?;

        Ok(DistributedGroup {
            group: merge_group.to_string(),
            path,
            source_count: merge_group.len(),
            page_count,
            recipients: record.recipients,
        })
    }

    /// Fetch every member of the group and concatenate them in group order.
    fn merge_group(&self, merge_group: &MergeGroup) -> Result<MergedDocument> {
        let mut sources = Vec::with_capacity(merge_group.len());
        for item in merge_group.items() {
            let reader = self
                .store
                .open_attachment(&item.message_ref, item.attachment_index)
                .map_err(|e| ReportError::SourceUnavailable {
                    item: item.filename().to_string(),
                    reason: e.to_string(),
                })?;
            sources.push((item.filename().to_string(), reader));
        }
        merge(sources, merge_group.merged_filename())
    }

    /// Stamp page numbers onto `document`, returning the numbered copy.
    fn paginate(&self, document: &Document) -> Result<Document> {
        let sizes = page_sizes(document);
        let overlay = build_overlay(sizes.len(), &sizes, &self.config.page_numbers)?;
        apply_overlay(document, &overlay)
    }

    fn render(&self, template: &str, merge_group: &MergeGroup, recipients: &Recipients) -> String {
        template
            .replace("{frequency}", merge_group.frequency())
            .replace("{region}", merge_group.region_stem())
            .replace("{addressee}", &recipients.addressee_name)
    }
}
