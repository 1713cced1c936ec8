// Fixture builders shared by the integration tests.
//
// Every PDF used by the tests is synthesised here with lopdf, so the suite
// needs no binary fixtures.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::path::Path;

/// Build a PDF whose page `i` is sized `sizes[i]` and shows the text
/// `"{label}-p{i}"`. `/Resources` and, when `rotate` is set, `/Rotate` live on
/// the page-tree node so they are inherited by the pages.
pub fn pdf_bytes_rotated(label: &str, sizes: &[(f32, f32)], rotate: Option<i64>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for (i, &(width, height)) in sizes.iter().enumerate() {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(72)]),
                Operation::new("Tj", vec![Object::string_literal(format!("{label}-p{i}"))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width),
                Object::Real(height),
            ],
        });
        kids.push(Object::Reference(page_id));
    }

    let mut pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(sizes.len() as i64),
        "Resources" => resources_id,
    };
    if let Some(rotate) = rotate {
        pages.set("Rotate", Object::Integer(rotate));
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

pub fn pdf_bytes(label: &str, sizes: &[(f32, f32)]) -> Vec<u8> {
    pdf_bytes_rotated(label, sizes, None)
}

/// A PDF of `pages` US Letter pages.
pub fn letter_pdf(label: &str, pages: usize) -> Vec<u8> {
    pdf_bytes(label, &vec![(612.0, 792.0); pages])
}

pub fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

/// Strings shown with `Tj` in the given content stream bytes.
pub fn shown_text(content: &[u8]) -> Vec<String> {
    Content::decode(content)
        .unwrap()
        .operations
        .iter()
        .filter(|op| op.operator == "Tj")
        .filter_map(|op| match op.operands.first() {
            Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        })
        .collect()
}

/// Text shown by the page's own content streams, in page order.
pub fn page_texts(doc: &Document) -> Vec<Vec<String>> {
    page_ids(doc)
        .into_iter()
        .map(|id| shown_text(&doc.get_page_content(id).unwrap()))
        .collect()
}

/// The number painted onto a page through its overlay form XObject, if any.
pub fn stamped_number(doc: &Document, page_id: ObjectId) -> Option<String> {
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    let form_name = content
        .operations
        .iter()
        .rev()
        .find(|op| op.operator == "Do")
        .and_then(|op| op.operands.first())
        .and_then(|o| o.as_name().ok())?
        .to_vec();

    let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
    let resources = match page.get(b"Resources").unwrap() {
        Object::Reference(id) => doc.get_object(*id).unwrap().as_dict().unwrap(),
        other => other.as_dict().unwrap(),
    };
    let form_id = resources
        .get(b"XObject")
        .unwrap()
        .as_dict()
        .unwrap()
        .get(&form_name)
        .unwrap()
        .as_reference()
        .unwrap();
    let form = doc.get_object(form_id).unwrap().as_stream().unwrap();
    shown_text(&form.content).into_iter().next()
}

/// Page attribute after resolving references.
pub fn page_attribute<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let page = doc.get_object(page_id).ok()?.as_dict().ok()?;
    match page.get(key).ok()? {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

pub fn media_box(doc: &Document, page_id: ObjectId) -> Vec<f32> {
    page_attribute(doc, page_id, b"MediaBox")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_float().unwrap())
        .collect()
}

/// Create `mailbox/<folder>/<message>.msg/<filename>` for each attachment.
pub fn write_attachment(mailbox: &Path, folder: &str, message: &str, filename: &str, bytes: &[u8]) {
    let dir = mailbox.join(folder).join(format!("{message}.msg"));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(filename), bytes).unwrap();
}
