use crate::ParsedFilename;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;

// ── SourceItem ───────────────────────────────────────────────────────────────

/// One PDF attachment found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    pub parsed_name: ParsedFilename,

    /// Opaque reference the message store uses to re-locate the message.
    pub message_ref: String,

    /// 1-based position of the attachment within its message.
    pub attachment_index: usize,

    /// Day the message was received, if known.
    pub received: Option<NaiveDate>,
}

impl SourceItem {
    pub fn new(parsed_name: ParsedFilename, message_ref: impl Into<String>, attachment_index: usize) -> Self {
        Self {
            parsed_name,
            message_ref: message_ref.into(),
            attachment_index,
            received: None,
        }
    }

    pub fn with_received(mut self, received: Option<NaiveDate>) -> Self {
        self.received = received;
        self
    }

    /// The attachment's display filename.
    pub fn filename(&self) -> &str {
        &self.parsed_name.raw
    }
}

impl fmt::Display for SourceItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}#{})", self.filename(), self.message_ref, self.attachment_index)
    }
}

// ── MergeGroup ───────────────────────────────────────────────────────────────

/// Items sharing one `(frequency, region_stem)` pair, in merge order.
///
/// Sections and appendices of the same pair belong to the same group, as do
/// regions that differ only in the case of their `.pdf` extension.
/// Groups are only built by [`group`] and are never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeGroup {
    items: Vec<SourceItem>,
}

impl MergeGroup {
    pub fn frequency(&self) -> &str {
        &self.items[0].parsed_name.frequency
    }

    /// Region of the first member, extension included.
    pub fn region(&self) -> &str {
        &self.items[0].parsed_name.region
    }

    /// Region without its `.pdf` extension; the team name used for
    /// recipient lookup.
    pub fn region_stem(&self) -> &str {
        self.items[0].parsed_name.region_stem()
    }

    /// Members in the order their pages appear in the merged document.
    pub fn items(&self) -> &[SourceItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `"{frequency} {region_stem}.pdf"`.
    pub fn merged_filename(&self) -> String {
        self.items[0].parsed_name.merged_filename()
    }

    pub fn into_items(self) -> Vec<SourceItem> {
        self.items
    }

    fn accepts(&self, item: &SourceItem) -> bool {
        let name = &item.parsed_name;
        name.frequency == self.frequency() && name.region_stem() == self.region_stem()
    }
}

impl fmt::Display for MergeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.frequency(), self.region_stem())
    }
}

// ── Grouping ─────────────────────────────────────────────────────────────────

/// Partition `items` into merge groups.
///
/// 1. Items whose filename was not recognised are discarded.
/// 2. The rest are sorted by `(region_stem, frequency, kind)`. Region stem
///    and frequency compare case-insensitively first, then by exact
///    spelling, so the members of one exact `(frequency, region_stem)` pair
///    are contiguous.
///    Items tied on that key are ordered by part, then by raw filename and
///    finally by where they were found.
/// 3. Consecutive items with equal `(frequency, region_stem)` form a group.
///
/// The group key is what names the merged document, so two groups never
/// share a `merged_filename`.
///
/// Groups come out in sorted order and their items in sorted order, so any
/// permutation of the same input yields the same groups in the same order.
pub fn group(items: impl IntoIterator<Item = SourceItem>) -> Vec<MergeGroup> {
    let mut sorted: Vec<SourceItem> = items
        .into_iter()
        .filter(|item| item.parsed_name.is_recognized())
        .collect();
    sorted.sort_by(|a, b| {
        compare(&a.parsed_name, &b.parsed_name)
            .then_with(|| a.message_ref.cmp(&b.message_ref))
            .then_with(|| a.attachment_index.cmp(&b.attachment_index))
    });

    let mut groups: Vec<MergeGroup> = Vec::new();
    for item in sorted {
        match groups.last_mut() {
            Some(current) if current.accepts(&item) => current.items.push(item),
            _ => groups.push(MergeGroup { items: vec![item] }),
        }
    }

    log::debug!("grouped into {} merge group(s)", groups.len());
    groups
}

fn compare(a: &ParsedFilename, b: &ParsedFilename) -> Ordering {
    caseless(a.region_stem(), b.region_stem())
        .then_with(|| caseless(&a.frequency, &b.frequency))
        .then_with(|| a.region_stem().cmp(b.region_stem()))
        .then_with(|| a.frequency.cmp(&b.frequency))
        .then_with(|| a.kind.cmp(&b.kind))
        .then_with(|| compare_parts(&a.part, &b.part))
        .then_with(|| a.raw.cmp(&b.raw))
}

/// Numeric parts compare by value (`"2" < "10"`), anything else as text.
fn compare_parts(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => caseless(a, b),
    }
}

fn caseless(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}
