//! Shared builders for unit tests. Compiled only under `cfg(test)`.

use crate::{
    document::{Address, Document},
    objects::{Dictionary, Object, Reference, Stream},
    page::{pages, Page},
};

/// Appends a page leaf under the catalog's page tree and returns it
pub(crate) fn add_test_page(
    doc: &mut Document,
    width: f32,
    height: f32,
    content: Vec<u8>,
) -> Page {
    let tree_number = doc
        .catalog()
        .unwrap()
        .get_reference("Pages")
        .unwrap()
        .object_number;

    let stream = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), content)));
    let page_ref = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
        ("Type", Object::name("Page")),
        ("Parent", Object::Reference(Reference::new(tree_number))),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(width),
                Object::Real(height),
            ]),
        ),
        ("Resources", Object::Dictionary(Dictionary::new())),
        ("Contents", Object::Reference(stream)),
    ])));

    let tree = doc.object_mut(tree_number).unwrap().as_dict_mut().unwrap();
    tree.push_to_array("Kids", Object::Reference(page_ref));
    let count = tree.get_integer("Count").unwrap_or(0);
    tree.insert("Count", Object::Integer(count + 1));

    let index = pages(doc).unwrap().len() - 1;
    Page {
        object_number: page_ref.object_number,
        index,
    }
}

/// Registers a simple Type1 font under the page's `/Font` resources
pub(crate) fn register_test_font(doc: &mut Document, page: &Page, key: &str, base_font: &str) {
    let font = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
        ("Type", Object::name("Font")),
        ("Subtype", Object::name("Type1")),
        ("BaseFont", Object::name(base_font)),
    ])));

    let addr = Address::new(page.object_number);
    let resources = doc
        .dict_at_mut(&addr)
        .unwrap()
        .get_mut("Resources")
        .unwrap()
        .as_dict_mut()
        .unwrap();

    match resources.get_mut("Font") {
        Some(Object::Dictionary(fonts)) => {
            fonts.insert(key, Object::Reference(font));
        }
        _ => {
            resources.insert(
                "Font",
                Object::Dictionary(Dictionary::from_entries(vec![(
                    key,
                    Object::Reference(font),
                )])),
            );
        }
    }
}

/// A single-page document showing "Hello World" at (72, 700) in
/// Helvetica 12
pub(crate) fn hello_world_document() -> Document {
    let mut doc = Document::new();
    let content = b"BT\n/F1 12 Tf\n72 700 Td\n(Hello World) Tj\nET".to_vec();
    let page = add_test_page(&mut doc, 612.0, 792.0, content);
    register_test_font(&mut doc, &page, "F1", "Helvetica");
    doc
}

/// The same document serialized to bytes
pub(crate) fn hello_world_pdf() -> Vec<u8> {
    hello_world_document().save().unwrap()
}
