use crate::pdf_utils::{self, INHERITABLE_KEYS};
use crate::{storage, ReportError, Result};
use lopdf::{dictionary, Document, Object, ObjectId};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Page-tree, navigation and cross-reference objects that are rebuilt, not
/// carried over.
const DISCARDED_TYPES: [&[u8]; 6] = [b"Catalog", b"Pages", b"Outlines", b"Outline", b"ObjStm", b"XRef"];

// ── MergedDocument ───────────────────────────────────────────────────────────

/// The concatenation of a group's source documents.
///
/// Returned by [`merge`].
#[derive(Debug, Clone)]
pub struct MergedDocument {
    /// The combined document, one page tree holding every source page.
    pub document: Document,

    /// Suggested output name, `"{frequency} {region}.pdf"`.
    pub filename: String,
}

impl MergedDocument {
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Serialise the document into a byte buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut document = self.document.clone();
        let mut buffer = Vec::new();
        document.save_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Write the document as `filename` inside `output_dir`, creating the
    /// directory if necessary. The file appears under its final name only
    /// once it has been written completely.
    pub fn save_atomic<P: AsRef<Path>>(&self, output_dir: P) -> Result<PathBuf> {
        let dir = output_dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        storage::save_document(&self.document, &path)?;
        Ok(path)
    }
}

// ── Merging ──────────────────────────────────────────────────────────────────

/// Concatenate the pages of `sources`, in the order given, into one document
/// named `filename`.
///
/// Each source is a `(label, reader)` pair; the label names the item in
/// errors. Every reader is drained completely before its pages are appended.
/// A read failure yields [`ReportError::SourceUnavailable`] and bytes that do
/// not parse yield [`ReportError::InvalidPdf`]; in both cases nothing of the
/// partial merge is returned.
///
/// Pages are moved structurally: content streams, resources, size and
/// rotation are carried over untouched.
///
/// ```no_run
/// use mergereportpdf::merge;
/// use std::fs::File;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sources = vec![
///     ("Monthly Sec 1 EMEA.pdf".to_string(), File::open("Monthly Sec 1 EMEA.pdf")?),
///     ("Monthly Sec 2 EMEA.pdf".to_string(), File::open("Monthly Sec 2 EMEA.pdf")?),
/// ];
/// let merged = merge(sources, "Monthly EMEA.pdf")?;
/// merged.save_atomic("./out")?;
/// # Ok(())
/// # }
/// ```
pub fn merge<I, R>(sources: I, filename: impl Into<String>) -> Result<MergedDocument>
where
    I: IntoIterator<Item = (String, R)>,
    R: Read,
{
    let mut merger = PageMerger::new();

    for (label, mut reader) in sources {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| ReportError::SourceUnavailable {
                item: label.clone(),
                reason: e.to_string(),
            })?;

        let source = Document::load_mem(&bytes)
            .map_err(|e| ReportError::InvalidPdf(format!("'{label}': {e}")))?;
        let appended = merger.append(source);
        log::debug!("appended {appended} page(s) from '{label}'");
    }

    let document = merger.finish()?;
    Ok(MergedDocument {
        document,
        filename: filename.into(),
    })
}

/// Accumulates the objects and page order of several documents.
struct PageMerger {
    objects: Vec<(ObjectId, Object)>,
    pages: Vec<ObjectId>,
    next_id: u32,
    version: String,
}

impl PageMerger {
    fn new() -> Self {
        Self {
            objects: Vec::new(),
            pages: Vec::new(),
            next_id: 1,
            version: "1.5".into(),
        }
    }

    /// Take over every page of `source`; returns the number of pages added.
    fn append(&mut self, mut source: Document) -> usize {
        source.renumber_objects_with(self.next_id);
        self.next_id = source.max_id + 1;
        if source.version.as_str() > self.version.as_str() {
            self.version = source.version.clone();
        }

        let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
        for &page_id in &page_ids {
            Self::pin_inherited_attributes(&mut source, page_id);
        }

        for (id, object) in std::mem::take(&mut source.objects) {
            let type_name = match &object {
                Object::Dictionary(dict) => pdf_utils::type_name(dict),
                Object::Stream(stream) => pdf_utils::type_name(&stream.dict),
                _ => None,
            };
            let discarded = type_name.map_or(false, |t| DISCARDED_TYPES.iter().any(|d| *d == t));
            if !discarded {
                self.objects.push((id, object));
            }
        }

        self.pages.extend(&page_ids);
        page_ids.len()
    }

    /// Copy attributes the page inherits from its (soon discarded) ancestors
    /// onto the page itself.
    fn pin_inherited_attributes(source: &mut Document, page_id: ObjectId) {
        let inherited: Vec<(&[u8], Object)> = INHERITABLE_KEYS
            .iter()
            .filter_map(|&key| {
                pdf_utils::inherited_attribute(source, page_id, key).map(|value| (key, value))
            })
            .collect();

        if let Ok(page) = source.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            for (key, value) in inherited {
                if !page.has(key) {
                    page.set(key, value);
                }
            }
        }
    }

    fn finish(self) -> Result<Document> {
        if self.pages.is_empty() {
            return Err(ReportError::InvalidPdf("merged sources contain no pages".into()));
        }

        let mut document = Document::with_version(self.version);
        document.objects.extend(self.objects);
        document.max_id = self.next_id - 1;

        let pages_id = document.new_object_id();
        for &page_id in &self.pages {
            if let Ok(page) = document.get_object_mut(page_id).and_then(Object::as_dict_mut) {
                page.set("Parent", pages_id);
            }
        }

        let kids: Vec<Object> = self.pages.iter().map(|&id| Object::Reference(id)).collect();
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(self.pages.len() as i64),
            }),
        );

        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        Ok(document)
    }
}
