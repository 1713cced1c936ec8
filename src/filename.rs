use crate::{ReportError, Result};
use std::fmt;

const SECTION_MARKER: &str = "Sec";
const APPENDIX_MARKER: &str = "Appendix";

// ── DocumentKind ─────────────────────────────────────────────────────────────

/// Which marker token a display filename carries.
///
/// The derived ordering puts sections before appendices, which is the order
/// they take inside a merged document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentKind {
    Section,
    Appendix,
    Unrecognized,
}

impl DocumentKind {
    fn marker(self) -> Option<&'static str> {
        match self {
            DocumentKind::Section => Some(SECTION_MARKER),
            DocumentKind::Appendix => Some(APPENDIX_MARKER),
            DocumentKind::Unrecognized => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentKind::Section => "section",
            DocumentKind::Appendix => "appendix",
            DocumentKind::Unrecognized => "unrecognized",
        })
    }
}

// ── ParsedFilename ───────────────────────────────────────────────────────────

/// A display filename decoded into its semantic fields.
///
/// Produced by [`parse`]. When `kind` is [`DocumentKind::Unrecognized`] the
/// `frequency`, `part` and `region` fields are empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    /// The filename exactly as it was received.
    pub raw: String,

    pub kind: DocumentKind,

    /// Reporting cadence, the text before the marker (e.g. `"Monthly"`).
    pub frequency: String,

    /// The token following the marker (e.g. `"1"`).
    pub part: String,

    /// Everything after `part`, extension included (e.g. `"EMEA.pdf"`).
    pub region: String,
}

impl ParsedFilename {
    /// Returns `true` unless the filename carried neither marker.
    pub fn is_recognized(&self) -> bool {
        self.kind != DocumentKind::Unrecognized
    }

    /// The region with a trailing `.pdf` extension removed (case-insensitive).
    ///
    /// ```
    /// # use mergereportpdf::parse;
    /// let parsed = parse("Weekly Appendix B North America.PDF").unwrap();
    /// assert_eq!(parsed.region, "North America.PDF");
    /// assert_eq!(parsed.region_stem(), "North America");
    /// ```
    pub fn region_stem(&self) -> &str {
        strip_pdf_extension(&self.region)
    }

    /// Name of the document this file is merged into:
    /// `"{frequency} {region_stem}.pdf"`.
    pub fn merged_filename(&self) -> String {
        format!("{} {}.pdf", self.frequency, self.region_stem())
    }

    fn unrecognized(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            kind: DocumentKind::Unrecognized,
            frequency: String::new(),
            part: String::new(),
            region: String::new(),
        }
    }
}

impl fmt::Display for ParsedFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.marker() {
            Some(marker) => write!(f, "{} {} {} {}", self.frequency, marker, self.part, self.region),
            None => f.write_str(&self.raw),
        }
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────────

/// Decode `raw` according to the `{frequency} {Sec|Appendix} {part} {region}`
/// convention.
///
/// The marker is matched as a whole whitespace-delimited token, so a
/// frequency or region merely containing `"Sec"` (e.g. `"InfoSec"`) is not
/// mistaken for it. A filename with no marker token parses successfully as
/// [`DocumentKind::Unrecognized`].
///
/// Returns [`ReportError::MalformedFilename`] when a marker is present but the
/// frequency, part or region around it is missing.
///
/// ```
/// use mergereportpdf::{parse, DocumentKind};
///
/// let parsed = parse("Monthly Sec 2 EMEA.pdf").unwrap();
/// assert_eq!(parsed.kind, DocumentKind::Section);
/// assert_eq!(parsed.frequency, "Monthly");
/// assert_eq!(parsed.part, "2");
/// assert_eq!(parsed.region, "EMEA.pdf");
///
/// assert_eq!(parse("minutes.pdf").unwrap().kind, DocumentKind::Unrecognized);
/// assert!(parse("Monthly Sec 2").is_err());
/// ```
pub fn parse(raw: &str) -> Result<ParsedFilename> {
    let marker = tokens(raw).find_map(|(offset, token)| match token {
        SECTION_MARKER => Some((offset, DocumentKind::Section)),
        APPENDIX_MARKER => Some((offset, DocumentKind::Appendix)),
        _ => None,
    });

    let (offset, kind) = match marker {
        Some(found) => found,
        None => return Ok(ParsedFilename::unrecognized(raw)),
    };
    let marker_len = kind.marker().map(str::len).unwrap_or_default();

    let frequency = raw[..offset].trim();
    if frequency.is_empty() {
        return Err(malformed(raw, kind, "no frequency before the marker"));
    }

    let rest = &raw[offset + marker_len..];
    let (part_offset, part) = tokens(rest)
        .next()
        .ok_or_else(|| malformed(raw, kind, "no part after the marker"))?;

    let region = rest[part_offset + part.len()..].trim();
    if region.is_empty() {
        return Err(malformed(raw, kind, "no region after the part"));
    }

    Ok(ParsedFilename {
        raw: raw.to_string(),
        kind,
        frequency: frequency.to_string(),
        part: part.to_string(),
        region: region.to_string(),
    })
}

/// Whitespace-delimited tokens of `text` together with their byte offsets.
fn tokens(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let base = text.as_ptr() as usize;
    text.split_whitespace()
        .map(move |token| (token.as_ptr() as usize - base, token))
}

fn malformed(raw: &str, kind: DocumentKind, reason: &str) -> ReportError {
    ReportError::MalformedFilename {
        filename: raw.to_string(),
        reason: format!("{kind} marker present but {reason}"),
    }
}

/// Strip a trailing `.pdf` (any case) from `name`.
pub(crate) fn strip_pdf_extension(name: &str) -> &str {
    let cut = name.len().saturating_sub(4);
    match name.get(cut..) {
        Some(ext) if ext.eq_ignore_ascii_case(".pdf") => &name[..cut],
        _ => name,
    }
}

/// Returns `true` when `name` ends in `.pdf`, ignoring case.
pub(crate) fn has_pdf_extension(name: &str) -> bool {
    strip_pdf_extension(name).len() != name.len()
}
