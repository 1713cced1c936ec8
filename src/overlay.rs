use crate::pdf_utils::{self, content_stream_ids, media_box};
use crate::{PageNumberStyle, ReportError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Resource name of the number font inside the overlay pages.
const FONT_RESOURCE: &str = "F1";

/// Prefix of the form XObject name the overlay is registered under on each
/// base page.
const FORM_RESOURCE_PREFIX: &str = "PgNum";

// ── PageSize ─────────────────────────────────────────────────────────────────

/// Width and height of a page in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const LETTER: PageSize = PageSize { width: 612.0, height: 792.0 };
    pub const A4: PageSize = PageSize { width: 595.0, height: 842.0 };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// The size of every page of `document`, in page order, taken from each
/// page's effective `/MediaBox`.
pub fn page_sizes(document: &Document) -> Vec<PageSize> {
    document
        .get_pages()
        .into_values()
        .map(|page_id| {
            let [llx, lly, urx, ury] = media_box(document, page_id);
            PageSize::new(urx - llx, ury - lly)
        })
        .collect()
}

// ── NumberedOverlay ──────────────────────────────────────────────────────────

/// Blank pages carrying nothing but a centred page number near the bottom
/// edge; built by [`build_overlay`] and consumed by [`apply_overlay`].
#[derive(Debug, Clone)]
pub struct NumberedOverlay {
    document: Document,
}

impl NumberedOverlay {
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The number printed on page `index` (0-based), or `None` for an
    /// unnumbered page.
    pub fn label(&self, index: usize) -> Result<Option<String>> {
        let page_id = self
            .document
            .get_pages()
            .into_values()
            .nth(index)
            .ok_or_else(|| ReportError::InvalidPdf(format!("overlay has no page {index}")))?;
        let content = Content::decode(&self.document.get_page_content(page_id)?)?;

        let label = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| op.operands.first())
            .find_map(|operand| match operand {
                Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            });
        Ok(label)
    }

    /// Serialise the overlay into a byte buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut document = self.document.clone();
        let mut buffer = Vec::new();
        document.save_to(&mut buffer)?;
        Ok(buffer)
    }
}

/// Build `page_count` blank pages, page `i` sized `page_sizes[i]`.
///
/// Page 0 stays blank; every later page carries its 0-based index, centred
/// horizontally at `style.bottom_margin` above the bottom edge.
///
/// ```
/// use mergereportpdf::{build_overlay, PageNumberStyle, PageSize};
///
/// let sizes = vec![PageSize::A4; 3];
/// let overlay = build_overlay(3, &sizes, &PageNumberStyle::default()).unwrap();
/// assert_eq!(overlay.page_count(), 3);
/// assert_eq!(overlay.label(0).unwrap(), None);
/// assert_eq!(overlay.label(2).unwrap().as_deref(), Some("2"));
/// ```
pub fn build_overlay(
    page_count: usize,
    page_sizes: &[PageSize],
    style: &PageNumberStyle,
) -> Result<NumberedOverlay> {
    if page_sizes.len() != page_count {
        return Err(ReportError::PageCountMismatch {
            base: page_sizes.len(),
            overlay: page_count,
        });
    }

    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();

    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(style.font.as_bytes().to_vec()),
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { FONT_RESOURCE => font_id },
    });

    let mut kids = Vec::with_capacity(page_count);
    for (index, size) in page_sizes.iter().enumerate() {
        let operations = if index == 0 {
            Vec::new()
        } else {
            number_operations(index, size, style)
        };
        let content = Content { operations }.encode()?;
        let content_id = document.add_object(Stream::new(dictionary! {}, content));

        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => rectangle([0.0, 0.0, size.width, size.height]),
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }

    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count as i64),
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    log::debug!("built {page_count}-page numbering overlay");
    Ok(NumberedOverlay { document })
}

fn number_operations(index: usize, size: &PageSize, style: &PageNumberStyle) -> Vec<Operation> {
    let label = index.to_string();
    let text_width = label.len() as f32 * digit_advance(&style.font) / 1000.0 * style.font_size;
    let x = (size.width - text_width) / 2.0;

    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![FONT_RESOURCE.into(), Object::Real(style.font_size)],
        ),
        Operation::new(
            "Td",
            vec![Object::Real(x), Object::Real(style.bottom_margin)],
        ),
        Operation::new("Tj", vec![Object::string_literal(label)]),
        Operation::new("ET", vec![]),
    ]
}

/// Advance width of the digits `0`-`9` in the standard base-14 font metrics,
/// in thousandths of an em. All digits share one width in these fonts.
fn digit_advance(font: &str) -> f32 {
    if font.starts_with("Courier") {
        600.0
    } else if font.starts_with("Times") {
        500.0
    } else {
        556.0
    }
}

fn rectangle(values: [f32; 4]) -> Vec<Object> {
    values.iter().map(|&v| Object::Real(v)).collect()
}

// ── Applying ─────────────────────────────────────────────────────────────────

/// Draw overlay page `i` over page `i` of `base` and return the result.
///
/// `base` is left untouched. Each overlay page becomes a form XObject that is
/// painted after the page's own content, which is wrapped in `q`/`Q` so its
/// graphics state cannot leak into the number. The form is placed at the
/// origin of the base page's `/MediaBox`.
///
/// Fails with [`ReportError::PageCountMismatch`] when the page counts differ.
pub fn apply_overlay(base: &Document, overlay: &NumberedOverlay) -> Result<Document> {
    let base_pages: Vec<ObjectId> = base.get_pages().into_values().collect();
    if base_pages.len() != overlay.page_count() {
        return Err(ReportError::PageCountMismatch {
            base: base_pages.len(),
            overlay: overlay.page_count(),
        });
    }

    let mut document = base.clone();
    let mut stamp = overlay.document.clone();
    stamp.renumber_objects_with(document.max_id + 1);

    let mut forms = Vec::with_capacity(base_pages.len());
    let mut page_content_ids = Vec::new();
    for page_id in stamp.get_pages().into_values() {
        let page = stamp.get_object(page_id)?.as_dict()?;
        page_content_ids.extend(content_stream_ids(&stamp, page));

        let [llx, lly, urx, ury] = media_box(&stamp, page_id);
        let resources = page
            .get(b"Resources")
            .cloned()
            .unwrap_or_else(|_| Object::Dictionary(Dictionary::new()));
        forms.push(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => rectangle([llx, lly, urx, ury]),
                "Resources" => resources,
            },
            stamp.get_page_content(page_id)?,
        ));
    }

    // Fonts and resource dictionaries are shared by the forms; the overlay's
    // own page tree and page contents are not needed any more.
    for (id, object) in std::mem::take(&mut stamp.objects) {
        let type_name = object.as_dict().ok().and_then(pdf_utils::type_name);
        let page_tree = matches!(type_name, Some(b"Catalog" | b"Pages" | b"Page"));
        if !page_tree && !page_content_ids.contains(&id) {
            document.objects.insert(id, object);
        }
    }
    document.max_id = document.max_id.max(stamp.max_id);

    for (page_id, form) in base_pages.into_iter().zip(forms) {
        let form_id = document.add_object(form);
        stamp_page(&mut document, page_id, form_id)?;
    }

    Ok(document)
}

/// Register `form_id` in the page's resources and paint it after the page's
/// existing content.
fn stamp_page(document: &mut Document, page_id: ObjectId, form_id: ObjectId) -> Result<()> {
    let [llx, lly, _, _] = media_box(document, page_id);
    let page = document.get_object(page_id)?.as_dict()?.clone();

    let mut resources = pdf_utils::inherited_attribute(document, page_id, b"Resources")
        .and_then(|r| pdf_utils::resolve_dict(document, &r))
        .unwrap_or_else(Dictionary::new);
    let mut xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|x| pdf_utils::resolve_dict(document, x))
        .unwrap_or_else(Dictionary::new);

    let form_name = (0..)
        .map(|n| format!("{FORM_RESOURCE_PREFIX}{n}"))
        .find(|name| !xobjects.has(name.as_bytes()))
        .unwrap_or_else(|| FORM_RESOURCE_PREFIX.to_string());
    xobjects.set(form_name.as_bytes(), form_id);
    resources.set("XObject", xobjects);

    let open = Content { operations: vec![Operation::new("q", vec![])] }.encode()?;
    let close = Content {
        operations: vec![
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(1),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(1),
                    Object::Real(llx),
                    Object::Real(lly),
                ],
            ),
            Operation::new("Do", vec![Object::Name(form_name.into_bytes())]),
            Operation::new("Q", vec![]),
        ],
    }
    .encode()?;

    let mut contents = vec![Object::Reference(
        document.add_object(Stream::new(dictionary! {}, open)),
    )];
    contents.extend(
        content_stream_ids(document, &page)
            .into_iter()
            .map(Object::Reference),
    );
    contents.push(Object::Reference(
        document.add_object(Stream::new(dictionary! {}, close)),
    ));

    let page = document.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", resources);
    page.set("Contents", contents);
    Ok(())
}
