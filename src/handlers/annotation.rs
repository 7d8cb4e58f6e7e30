use crate::{
    document::{Address, Document},
    error::{PdfError, PdfResult},
    handlers::structure::{allocate_parent_tree_key, parent_tree_append, struct_tree_root_number},
    handlers::NodeIndex,
    instructions::{AnnotationInstruction, Bbox},
    objects::{Dictionary, Object, Reference, Stream},
    page,
};

/// Annotation edits: content strings, structure association through OBJR
/// kids and the parent tree, and minimal form widgets
#[derive(Debug, Default)]
pub struct AnnotationHandler;

impl AnnotationHandler {
    pub fn apply(
        &self,
        doc: &mut Document,
        instructions: &[AnnotationInstruction],
        index: &NodeIndex,
    ) -> PdfResult<()> {
        for instruction in instructions {
            match instruction {
                AnnotationInstruction::SetContents { page, index, value } => {
                    set_string(doc, *page, *index, "Contents", value)?
                }
                AnnotationInstruction::SetTu { page, index, value } => {
                    set_string(doc, *page, *index, "TU", value)?
                }
                AnnotationInstruction::Associate {
                    page,
                    index: annot_index,
                    node,
                } => associate(doc, *page, *annot_index, node, index)?,
                AnnotationInstruction::CreateWidget {
                    page,
                    field_name,
                    field_type,
                    tu,
                    rect,
                } => create_widget(doc, *page, field_name, field_type, tu.as_deref(), rect)?,
            }
        }

        Ok(())
    }
}

/// The address of the page's `index`-th annotation, failing with a message
/// that names the page, the requested index and the observed count
fn annotation_at(doc: &mut Document, page_number: usize, index: usize) -> PdfResult<Address> {
    let page = page::page_at(doc, page_number)?;
    let addresses = page::annotation_addresses(doc, &page)?;
    let count = addresses.len();

    addresses.into_iter().nth(index).ok_or_else(|| {
        PdfError::not_found(
            format!("annotation index {}", index),
            format!("page {} ({} annotations)", page_number, count),
        )
    })
}

fn set_string(
    doc: &mut Document,
    page: usize,
    index: usize,
    key: &str,
    value: &str,
) -> PdfResult<()> {
    let addr = annotation_at(doc, page, index)?;
    doc.dict_at_mut(&addr)?
        .insert(key, Object::string(value.to_owned()));
    Ok(())
}

/// Attaches the annotation to a structure node: an OBJR kid on the node,
/// a fresh parent-tree key on the annotation's `/StructParent`, and the
/// node as that key's parent-tree value
fn associate(
    doc: &mut Document,
    page_number: usize,
    annot_index: usize,
    node_id: &str,
    index: &NodeIndex,
) -> PdfResult<()> {
    let elem = index.get(node_id)?;
    let page = page::page_at(doc, page_number)?;
    let annot_addr = annotation_at(doc, page_number, annot_index)?;
    let annot_ref = Reference::new(annot_addr.object_number);

    let objr = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
        ("Type", Object::name("OBJR")),
        ("Obj", Object::Reference(annot_ref)),
        ("Pg", Object::Reference(Reference::new(page.object_number))),
    ])));

    doc.object_mut(elem.object_number)
        .and_then(Object::as_dict_mut)
        .ok_or_else(|| {
            PdfError::internal(format!("structure element {} vanished", elem.object_number))
        })?
        .push_to_array("K", Object::Reference(objr));

    let root_number = struct_tree_root_number(doc)?;
    let key = allocate_parent_tree_key(doc, root_number)?;

    doc.dict_at_mut(&annot_addr)?
        .insert("StructParent", Object::Integer(key));
    parent_tree_append(doc, root_number, key, Object::Reference(elem))?;

    Ok(())
}

fn create_widget(
    doc: &mut Document,
    page_number: usize,
    field_name: &str,
    field_type: &str,
    tu: Option<&str>,
    rect: &Bbox,
) -> PdfResult<()> {
    let page = page::page_at(doc, page_number)?;

    let appearance = minimal_appearance(doc, field_type, rect.width, rect.height);

    let mut widget = Dictionary::from_entries(vec![
        ("Type", Object::name("Annot")),
        ("Subtype", Object::name("Widget")),
        ("T", Object::string(field_name.to_owned())),
        ("FT", Object::name(field_type.to_owned())),
        // print flag
        ("F", Object::Integer(4)),
        (
            "Rect",
            Object::Array(vec![
                Object::Real(rect.x),
                Object::Real(rect.y),
                Object::Real(rect.x + rect.width),
                Object::Real(rect.y + rect.height),
            ]),
        ),
        (
            "AP",
            Object::Dictionary(Dictionary::from_entries(vec![(
                "N",
                Object::Reference(appearance),
            )])),
        ),
    ]);
    if let Some(tu) = tu {
        widget.insert("TU", Object::string(tu.to_owned()));
    }

    let widget_ref = doc.add_object(Object::Dictionary(widget));

    // page /Annots, which may itself live behind a reference
    if page::page_dict(doc, &page)?.contains_key("Annots") {
        let addr = doc.locate(page.object_number, &["Annots"])?;
        match doc.object_at_mut(&addr)? {
            Object::Array(arr) => arr.push(Object::Reference(widget_ref)),
            other => {
                *other = Object::Array(vec![Object::Reference(widget_ref)]);
            }
        }
    } else {
        let addr = Address::new(page.object_number);
        doc.dict_at_mut(&addr)?
            .insert("Annots", Object::Array(vec![Object::Reference(widget_ref)]));
    }

    ensure_acro_form_field(doc, widget_ref)
}

/// A form XObject just big enough for viewers that insist on an
/// appearance: an outline for buttons, a base line for everything else
fn minimal_appearance(doc: &mut Document, field_type: &str, width: f32, height: f32) -> Reference {
    let content = if field_type == "Btn" {
        format!("0 0 {} {} re S", width, height)
    } else {
        format!("0 0 m {} 0 l S", width)
    };

    let dict = Dictionary::from_entries(vec![
        ("Type", Object::name("XObject")),
        ("Subtype", Object::name("Form")),
        (
            "BBox",
            Object::Array(vec![
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(width),
                Object::Real(height),
            ]),
        ),
    ]);

    doc.add_object(Object::Stream(Stream::new(dict, content.into_bytes())))
}

fn ensure_acro_form_field(doc: &mut Document, widget: Reference) -> PdfResult<()> {
    let has_acro_form = doc.catalog()?.contains_key("AcroForm");

    if !has_acro_form {
        doc.catalog_mut()?.insert(
            "AcroForm",
            Object::Dictionary(Dictionary::from_entries(vec![(
                "Fields",
                Object::Array(Vec::new()),
            )])),
        );
    }

    let catalog_number = doc.catalog_number()?;
    let addr = doc.locate(catalog_number, &["AcroForm"])?;
    doc.dict_at_mut(&addr)?
        .push_to_array("Fields", Object::Reference(widget));

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        handlers::StructureHandler,
        instructions::{StructureInstruction, StructureNode},
        page::Page,
        testutil,
    };

    fn fixture_with_link() -> (Document, Page) {
        let mut doc = Document::new();
        let page = testutil::add_test_page(&mut doc, 612.0, 792.0, b"BT ET".to_vec());

        let annot = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![
            ("Type", Object::name("Annot")),
            ("Subtype", Object::name("Link")),
        ])));
        let addr = Address::new(page.object_number);
        doc.dict_at_mut(&addr)
            .unwrap()
            .insert("Annots", Object::Array(vec![Object::Reference(annot)]));

        (doc, page)
    }

    fn node_index(doc: &mut Document) -> NodeIndex {
        StructureHandler
            .apply(
                doc,
                &StructureInstruction {
                    strip_existing: false,
                    root: "Document".to_owned(),
                    children: vec![StructureNode {
                        id: Some("link1".to_owned()),
                        role: "Link".to_owned(),
                        ..StructureNode::default()
                    }],
                },
            )
            .unwrap()
    }

    #[test]
    fn set_contents_writes_the_string() {
        let (mut doc, page) = fixture_with_link();

        AnnotationHandler
            .apply(
                &mut doc,
                &[AnnotationInstruction::SetContents {
                    page: 1,
                    index: 0,
                    value: "Figure link".to_owned(),
                }],
                &NodeIndex::new(),
            )
            .unwrap();

        let addrs = page::annotation_addresses(&mut doc, &page).unwrap();
        let annot = doc.object_at(&addrs[0]).unwrap().as_dict().unwrap();
        assert_eq!(annot.get_string("Contents"), Some("Figure link"));
    }

    #[test]
    fn out_of_range_index_identifies_the_count() {
        let (mut doc, _) = fixture_with_link();

        let err = AnnotationHandler
            .apply(
                &mut doc,
                &[AnnotationInstruction::SetTu {
                    page: 1,
                    index: 3,
                    value: "x".to_owned(),
                }],
                &NodeIndex::new(),
            )
            .unwrap_err();

        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().contains("annotation index 3"));
        assert!(err.to_string().contains("1 annotations"));
    }

    #[test]
    fn associate_wires_objr_and_parent_tree() {
        let (mut doc, page) = fixture_with_link();
        let index = node_index(&mut doc);

        AnnotationHandler
            .apply(
                &mut doc,
                &[AnnotationInstruction::Associate {
                    page: 1,
                    index: 0,
                    node: "link1".to_owned(),
                }],
                &index,
            )
            .unwrap();

        let elem = index.get("link1").unwrap();
        let elem_dict = doc.get_object(elem.object_number).unwrap().as_dict().unwrap();
        let kids = elem_dict.get("K").unwrap().as_array().unwrap();
        let objr = doc.resolve(&kids[0]).as_dict().unwrap();
        assert_eq!(objr.get_name("Type"), Some("OBJR"));
        assert_eq!(
            objr.get_reference("Pg").unwrap().object_number,
            page.object_number
        );

        let annot_ref = objr.get_reference("Obj").unwrap();
        let annot = doc
            .get_object(annot_ref.object_number)
            .unwrap()
            .as_dict()
            .unwrap();
        assert_eq!(annot.get_integer("StructParent"), Some(0));

        let catalog = doc.catalog().unwrap();
        let root = doc.dict_get_dict(catalog, "StructTreeRoot").unwrap();
        assert_eq!(root.get_integer("ParentTreeNextKey"), Some(1));
        let tree = doc.dict_get_dict(root, "ParentTree").unwrap();
        let nums = tree.get("Nums").unwrap().as_array().unwrap();
        assert_eq!(nums[0], Object::Integer(0));
        assert_eq!(nums[1], Object::Reference(elem));
    }

    #[test]
    fn associate_unknown_node_fails() {
        let (mut doc, _) = fixture_with_link();

        let err = AnnotationHandler
            .apply(
                &mut doc,
                &[AnnotationInstruction::Associate {
                    page: 1,
                    index: 0,
                    node: "ghost".to_owned(),
                }],
                &NodeIndex::new(),
            )
            .unwrap_err();

        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn create_widget_builds_acroform_with_one_field() {
        let mut doc = Document::new();
        let page = testutil::add_test_page(&mut doc, 612.0, 792.0, b"BT ET".to_vec());

        AnnotationHandler
            .apply(
                &mut doc,
                &[AnnotationInstruction::CreateWidget {
                    page: 1,
                    field_name: "signature".to_owned(),
                    field_type: "Sig".to_owned(),
                    tu: Some("Sign here".to_owned()),
                    rect: Bbox {
                        x: 100.0,
                        y: 100.0,
                        width: 150.0,
                        height: 40.0,
                    },
                }],
                &NodeIndex::new(),
            )
            .unwrap();

        let catalog = doc.catalog().unwrap();
        let acro_form = doc.dict_get_dict(catalog, "AcroForm").unwrap();
        let fields = acro_form.get("Fields").unwrap().as_array().unwrap();
        assert_eq!(fields.len(), 1);

        let widget = doc.resolve(&fields[0]).as_dict().unwrap();
        assert_eq!(widget.get_name("Subtype"), Some("Widget"));
        assert_eq!(widget.get_string("T"), Some("signature"));
        assert_eq!(widget.get_integer("F"), Some(4));
        assert_eq!(widget.get_string("TU"), Some("Sign here"));
        let rect = widget.get("Rect").unwrap().as_array().unwrap();
        assert_eq!(rect[2].as_number(), Some(250.0));

        // the page points at the same widget
        let page_dict = page::page_dict(&doc, &page).unwrap();
        let annots = doc.dict_get_array(page_dict, "Annots").unwrap();
        assert_eq!(annots.len(), 1);

        // non-button appearance draws a base line
        let ap = doc.dict_get_dict(widget, "AP").unwrap();
        let appearance = doc.dict_get_stream(ap, "N").unwrap();
        assert_eq!(appearance.data, b"0 0 m 150 0 l S");
    }

    #[test]
    fn button_widgets_get_an_outline_appearance() {
        let mut doc = Document::new();
        testutil::add_test_page(&mut doc, 612.0, 792.0, b"BT ET".to_vec());

        AnnotationHandler
            .apply(
                &mut doc,
                &[AnnotationInstruction::CreateWidget {
                    page: 1,
                    field_name: "ok".to_owned(),
                    field_type: "Btn".to_owned(),
                    tu: None,
                    rect: Bbox {
                        x: 0.0,
                        y: 0.0,
                        width: 60.0,
                        height: 20.0,
                    },
                }],
                &NodeIndex::new(),
            )
            .unwrap();

        let catalog = doc.catalog().unwrap();
        let acro_form = doc.dict_get_dict(catalog, "AcroForm").unwrap();
        let widget = doc.resolve(&acro_form.get("Fields").unwrap().as_array().unwrap()[0]);
        let ap = doc.dict_get_dict(widget.as_dict().unwrap(), "AP").unwrap();
        let appearance = doc.dict_get_stream(ap, "N").unwrap();
        assert_eq!(appearance.data, b"0 0 60 20 re S");
    }
}
