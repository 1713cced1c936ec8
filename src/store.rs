use crate::filename::has_pdf_extension;
use crate::{ReportError, Result};
use chrono::{DateTime, Local, NaiveDate};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Directory-name suffix that marks a message inside a [`DirectoryMessageStore`].
const MESSAGE_SUFFIX: &str = ".msg";

// ── Folder tree ──────────────────────────────────────────────────────────────

/// Identifies a folder to the store that listed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    pub store_id: String,
    pub entry_id: String,
}

/// One folder of a mailbox together with its sub-folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNode {
    pub name: String,
    pub folder: FolderRef,
    pub children: Vec<FolderNode>,
}

impl FolderNode {
    /// Find a folder by its `/`-separated path of names below this node.
    /// An empty path names this node itself.
    pub fn find(&self, path: &str) -> Option<&FolderNode> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| {
                node.children.iter().find(|child| child.name == segment)
            })
    }

    /// Every folder in the tree, depth first, with its nesting depth.
    pub fn walk(&self) -> Vec<(usize, &FolderNode)> {
        let mut out = Vec::new();
        self.walk_into(0, &mut out);
        out
    }

    fn walk_into<'a>(&'a self, depth: usize, out: &mut Vec<(usize, &'a FolderNode)>) {
        out.push((depth, self));
        for child in &self.children {
            child.walk_into(depth + 1, out);
        }
    }
}

/// A PDF attachment as listed by a [`MessageStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentEntry {
    pub message_ref: String,
    pub filename: String,
    /// 1-based position within the message.
    pub attachment_index: usize,
    /// Day the message was received, when the store knows it.
    pub received: Option<NaiveDate>,
}

// ── MessageStore ─────────────────────────────────────────────────────────────

/// Source of folders, messages and attachment bytes.
pub trait MessageStore {
    /// The folder tree of the mailbox, rooted at the mailbox itself.
    fn list_folders(&self) -> Result<FolderNode>;

    /// PDF attachments of every message directly inside `folder`.
    fn list_attachments(&self, folder: &FolderRef) -> Result<Vec<AttachmentEntry>>;

    /// Open attachment `attachment_index` (1-based) of `message_ref` for reading.
    fn open_attachment(&self, message_ref: &str, attachment_index: usize) -> Result<Box<dyn Read>>;
}

// ── DirectoryMessageStore ────────────────────────────────────────────────────

/// A [`MessageStore`] laid out on the file system.
///
/// ```text
/// mailbox/                  ← root folder
///   Reports/                ← folder
///     2024-01-03.msg/       ← message
///       Monthly Sec 1 EMEA.pdf
///       cover.txt
///     Archive/              ← sub-folder
/// ```
///
/// Attachments are the regular files of a message directory, numbered from 1
/// in filename order. Only files ending in `.pdf` (any case) are listed.
///
/// A message directory named `YYYY-MM-DD…` was received on that day;
/// otherwise its modification time is used.
#[derive(Debug, Clone)]
pub struct DirectoryMessageStore {
    root: PathBuf,
}

impl DirectoryMessageStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ReportError::ConfigError(format!(
                "mailbox '{}' is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn store_id(&self) -> String {
        self.root.display().to_string()
    }

    fn folder_node(&self, relative: &Path) -> Result<FolderNode> {
        let name = match relative.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self
                .root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.store_id()),
        };

        let mut children = Vec::new();
        for dir in sorted_entries(&self.root.join(relative))? {
            let dir_name = dir.file_name().map(|n| n.to_string_lossy().into_owned());
            match dir_name {
                Some(n) if dir.is_dir() && !n.ends_with(MESSAGE_SUFFIX) => {
                    children.push(self.folder_node(&relative.join(n))?);
                }
                _ => {}
            }
        }

        Ok(FolderNode {
            name,
            folder: FolderRef {
                store_id: self.store_id(),
                entry_id: relative.to_string_lossy().replace('\\', "/"),
            },
            children,
        })
    }

    /// The regular files of a message directory, in attachment order.
    fn attachments_of(&self, message_ref: &str) -> Result<Vec<PathBuf>> {
        let dir = self.resolve(message_ref)?;
        Ok(sorted_entries(&dir)?
            .into_iter()
            .filter(|path| path.is_file())
            .collect())
    }

    /// Map an entry id back to a path, refusing ids that escape the root.
    fn resolve(&self, entry_id: &str) -> Result<PathBuf> {
        let relative = Path::new(entry_id);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir));
        if escapes {
            return Err(ReportError::ConfigError(format!(
                "entry '{entry_id}' is outside the mailbox"
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl MessageStore for DirectoryMessageStore {
    fn list_folders(&self) -> Result<FolderNode> {
        self.folder_node(Path::new(""))
    }

    fn list_attachments(&self, folder: &FolderRef) -> Result<Vec<AttachmentEntry>> {
        let folder_dir = self.resolve(&folder.entry_id)?;
        let mut entries = Vec::new();

        for message_dir in sorted_entries(&folder_dir)? {
            let is_message = message_dir.is_dir()
                && message_dir
                    .file_name()
                    .map_or(false, |n| n.to_string_lossy().ends_with(MESSAGE_SUFFIX));
            if !is_message {
                continue;
            }

            let message_ref = message_dir
                .strip_prefix(&self.root)
                .unwrap_or(&message_dir)
                .to_string_lossy()
                .replace('\\', "/");

            let received = received_date(&message_dir);
            for (position, path) in self.attachments_of(&message_ref)?.iter().enumerate() {
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if has_pdf_extension(&filename) {
                    entries.push(AttachmentEntry {
                        message_ref: message_ref.clone(),
                        filename,
                        attachment_index: position + 1,
                        received,
                    });
                }
            }
        }

        log::debug!(
            "found {} PDF attachment(s) in '{}'",
            entries.len(),
            folder.entry_id
        );
        Ok(entries)
    }

    fn open_attachment(&self, message_ref: &str, attachment_index: usize) -> Result<Box<dyn Read>> {
        let attachments = self.attachments_of(message_ref)?;
        let path = attachment_index
            .checked_sub(1)
            .and_then(|i| attachments.get(i))
            .ok_or_else(|| ReportError::SourceUnavailable {
                item: format!("{message_ref}#{attachment_index}"),
                reason: format!("message has {} attachment(s)", attachments.len()),
            })?;
        Ok(Box::new(File::open(path)?))
    }
}

/// Directory entries of `dir`, sorted by file name.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

fn received_date(message_dir: &Path) -> Option<NaiveDate> {
    let from_name = message_dir
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.get(..10))
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok());
    from_name.or_else(|| {
        let modified = fs::metadata(message_dir).ok()?.modified().ok()?;
        Some(DateTime::<Local>::from(modified).date_naive())
    })
}
