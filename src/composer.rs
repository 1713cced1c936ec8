use crate::{storage, Recipients, ReportError, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::Message;
use std::io::Write;
use std::path::{Path, PathBuf};

// ── DistributionRecord ───────────────────────────────────────────────────────

/// A finished, numbered document paired with who receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionRecord {
    /// `From` mailbox of the draft.
    pub sender: String,
    pub recipients: Recipients,
    pub subject: String,
    pub body: String,
    pub attachment: PathBuf,
}

// ── MailComposer ─────────────────────────────────────────────────────────────

/// Accepts drafts for sending. Composing or queueing is the whole contract;
/// delivery is never confirmed.
pub trait MailComposer {
    fn compose(&mut self, record: &DistributionRecord) -> Result<()>;
}

// ── OutboxComposer ───────────────────────────────────────────────────────────

/// Writes each draft as a MIME message (`.eml`) into an outbox directory,
/// with the document attached as `application/pdf`.
///
/// Bcc recipients are kept in the draft so the outbox holds the full
/// addressing.
#[derive(Debug, Clone)]
pub struct OutboxComposer {
    outbox: PathBuf,
    drafts: Vec<PathBuf>,
}

impl OutboxComposer {
    pub fn new<P: AsRef<Path>>(outbox: P) -> Self {
        Self {
            outbox: outbox.as_ref().to_path_buf(),
            drafts: Vec::new(),
        }
    }

    /// Paths of the drafts written so far.
    pub fn drafts(&self) -> &[PathBuf] {
        &self.drafts
    }

    fn draft_path(&self, record: &DistributionRecord) -> PathBuf {
        let stem = record
            .attachment
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "draft".into());
        self.outbox.join(format!("{stem}.eml"))
    }
}

impl MailComposer for OutboxComposer {
    fn compose(&mut self, record: &DistributionRecord) -> Result<()> {
        let message = build_message(record)?;

        std::fs::create_dir_all(&self.outbox)?;
        let path = self.draft_path(record);
        storage::write_atomic(&path, |out| {
            out.write_all(&message.formatted())?;
            Ok(())
        })?;

        log::info!("drafted '{}' to {}", record.subject, record.recipients.to.join(", "));
        self.drafts.push(path);
        Ok(())
    }
}

/// Assemble the MIME message for `record`: a plain-text body followed by the
/// document as an attachment.
pub fn build_message(record: &DistributionRecord) -> Result<Message> {
    let recipients = &record.recipients;
    let mut builder = Message::builder()
        .from(mailbox(&record.sender)?)
        .subject(record.subject.as_str())
        .keep_bcc();
    for address in &recipients.to {
        builder = builder.to(mailbox(address)?);
    }
    for address in &recipients.cc {
        builder = builder.cc(mailbox(address)?);
    }
    for address in &recipients.bcc {
        builder = builder.bcc(mailbox(address)?);
    }

    let filename = record
        .attachment
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.pdf".into());
    let pdf = std::fs::read(&record.attachment)?;
    let content_type =
        ContentType::parse("application/pdf").map_err(|e| ReportError::MailError(e.to_string()))?;

    builder
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(record.body.clone()))
                .singlepart(Attachment::new(filename).body(pdf, content_type)),
        )
        .map_err(|e| ReportError::MailError(e.to_string()))
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse()
        .map_err(|e: lettre::address::AddressError| {
            ReportError::MailError(format!("invalid address '{address}': {e}"))
        })
}
