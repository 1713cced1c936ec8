//! Shared PDF object-graph helpers used by the merge and overlay modules.

use lopdf::{Dictionary, Document, Object, ObjectId};

/// Page attributes a page may inherit from its ancestors in the page tree.
pub const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `/Parent` chains in damaged files.
const MAX_TREE_DEPTH: usize = 64;

/// US Letter, used when a page declares no `/MediaBox` anywhere in its chain.
pub const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Returns the `/Type` name of a dictionary, if it has one.
pub fn type_name(dict: &Dictionary) -> Option<&[u8]> {
    dict.get(b"Type").and_then(Object::as_name).ok()
}

/// Follow `value` if it is a reference, returning the object it points to.
pub fn resolve<'a>(document: &'a Document, value: &'a Object) -> Option<&'a Object> {
    match value.as_reference() {
        Ok(id) => document.get_object(id).ok(),
        Err(_) => Some(value),
    }
}

/// Helper to resolve a value that might be inline or a reference to a dictionary.
pub fn resolve_dict(document: &Document, value: &Object) -> Option<Dictionary> {
    resolve(document, value).and_then(|o| o.as_dict().ok().cloned())
}

/// Look up `key` on the page, walking `/Parent` links when the page does not
/// carry it itself.
pub fn inherited_attribute(document: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node_id = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let node = document.get_object(node_id).ok()?.as_dict().ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        node_id = node.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

/// The effective `/MediaBox` of a page as `[llx, lly, urx, ury]`.
pub fn media_box(document: &Document, page_id: ObjectId) -> [f32; 4] {
    let values = inherited_attribute(document, page_id, b"MediaBox")
        .and_then(|o| resolve(document, &o).and_then(|o| o.as_array().ok().cloned()))
        .map(|array| {
            array
                .iter()
                .filter_map(|v| v.as_float().ok())
                .collect::<Vec<f32>>()
        });

    match values.as_deref() {
        Some([llx, lly, urx, ury]) => [llx.min(*urx), lly.min(*ury), llx.max(*urx), lly.max(*ury)],
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// Object ids of a page's content streams, in drawing order.
pub fn content_stream_ids(document: &Document, page: &Dictionary) -> Vec<ObjectId> {
    let contents = match page.get(b"Contents") {
        Ok(value) => value,
        Err(_) => return Vec::new(),
    };

    let array = match contents {
        Object::Reference(id) => match document.get_object(*id) {
            Ok(Object::Array(array)) => array.clone(),
            Ok(_) => return vec![*id],
            Err(_) => return Vec::new(),
        },
        Object::Array(array) => array.clone(),
        _ => return Vec::new(),
    };

    array.iter().filter_map(|o| o.as_reference().ok()).collect()
}
