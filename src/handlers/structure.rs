use std::collections::HashMap;

use crate::{
    document::Document,
    error::{PdfError, PdfResult},
    instructions::{StructureInstruction, StructureNode},
    objects::{Dictionary, Object, Reference},
};

/// Structure nodes addressable by later handlers, keyed by the
/// caller-supplied identifier. Nodes created without one exist in the tree
/// but cannot be referenced again
#[derive(Debug, Default)]
pub struct NodeIndex {
    map: HashMap<String, Reference>,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> PdfResult<Reference> {
        self.map.get(id).copied().ok_or_else(|| {
            PdfError::not_found(format!("structure node {:?}", id), "node index".to_owned())
        })
    }

    pub fn insert(&mut self, id: String, node: Reference) {
        self.map.insert(id, node);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Ensures the document is tagged and grows the logical structure tree
/// from the instruction's node forest
#[derive(Debug, Default)]
pub struct StructureHandler;

impl StructureHandler {
    pub fn apply(
        &self,
        doc: &mut Document,
        instruction: &StructureInstruction,
    ) -> PdfResult<NodeIndex> {
        let root_number = struct_tree_root_number(doc)?;

        if instruction.strip_existing {
            strip_existing_tree(doc, root_number)?;
        }

        // a tagged document also declares itself marked
        set_mark_info_marked(doc)?;

        let mut index = NodeIndex::new();

        let root_node = StructureNode {
            role: instruction.root.clone(),
            children: instruction.children.clone(),
            ..StructureNode::default()
        };
        let root_elem = create_element(doc, &root_node, Reference::new(root_number), &mut index)?;

        doc.object_mut(root_number)
            .and_then(Object::as_dict_mut)
            .ok_or_else(|| PdfError::internal("structure tree root vanished"))?
            .push_to_array("K", Object::Reference(root_elem));

        Ok(index)
    }
}

/// The object number of the catalog's StructTreeRoot, creating it (or
/// promoting a direct dictionary to an indirect object) when needed
pub(crate) fn struct_tree_root_number(doc: &mut Document) -> PdfResult<usize> {
    let catalog = doc.catalog()?;

    match catalog.get("StructTreeRoot") {
        Some(Object::Reference(r)) => Ok(r.object_number),
        Some(Object::Dictionary(dict)) => {
            let copy = dict.clone();
            let promoted = doc.add_object(Object::Dictionary(copy));
            doc.catalog_mut()?
                .insert("StructTreeRoot", Object::Reference(promoted));
            Ok(promoted.object_number)
        }
        _ => {
            let created = doc.add_object(Object::Dictionary(Dictionary::from_entries(vec![(
                "Type",
                Object::name("StructTreeRoot"),
            )])));
            doc.catalog_mut()?
                .insert("StructTreeRoot", Object::Reference(created));
            Ok(created.object_number)
        }
    }
}

/// Claims the next parent-tree key: read `ParentTreeNextKey` (default 0),
/// hand it out, write back the increment. The same allocator serves page
/// StructParents keys and annotation StructParent keys
pub(crate) fn allocate_parent_tree_key(doc: &mut Document, root_number: usize) -> PdfResult<i64> {
    let root = doc
        .object_mut(root_number)
        .and_then(Object::as_dict_mut)
        .ok_or_else(|| PdfError::parse("StructTreeRoot is not a dictionary"))?;

    let key = root.get_integer("ParentTreeNextKey").unwrap_or(0);
    root.insert("ParentTreeNextKey", Object::Integer(key + 1));

    Ok(key)
}

/// Appends a `(key, value)` pair to the parent tree's `/Nums`, creating
/// the tree when absent
pub(crate) fn parent_tree_append(
    doc: &mut Document,
    root_number: usize,
    key: i64,
    value: Object,
) -> PdfResult<()> {
    let has_tree = doc
        .get_object(root_number)
        .and_then(Object::as_dict)
        .map_or(false, |root| root.contains_key("ParentTree"));

    if !has_tree {
        doc.object_mut(root_number)
            .and_then(Object::as_dict_mut)
            .ok_or_else(|| PdfError::parse("StructTreeRoot is not a dictionary"))?
            .insert(
                "ParentTree",
                Object::Dictionary(Dictionary::from_entries(vec![
                    ("Type", Object::name("NumberTree")),
                    ("Nums", Object::Array(Vec::new())),
                ])),
            );
    }

    let addr = doc.locate(root_number, &["ParentTree"])?;
    let tree = doc.dict_at_mut(&addr)?;

    match tree.get_mut("Nums") {
        Some(Object::Array(nums)) => {
            nums.push(Object::Integer(key));
            nums.push(value);
        }
        _ => {
            tree.insert("Nums", Object::Array(vec![Object::Integer(key), value]));
        }
    }

    Ok(())
}

/// Removes the tag tree but keeps the root dictionary itself
fn strip_existing_tree(doc: &mut Document, root_number: usize) -> PdfResult<()> {
    let root = doc
        .object_mut(root_number)
        .and_then(Object::as_dict_mut)
        .ok_or_else(|| PdfError::parse("StructTreeRoot is not a dictionary"))?;

    root.remove("K");
    root.remove("ParentTree");
    root.remove("ParentTreeNextKey");

    Ok(())
}

fn set_mark_info_marked(doc: &mut Document) -> PdfResult<()> {
    let has_mark_info = doc.catalog()?.contains_key("MarkInfo");

    if !has_mark_info {
        doc.catalog_mut()?
            .insert("MarkInfo", Object::Dictionary(Dictionary::new()));
    }

    let catalog_number = doc.catalog_number()?;
    let addr = doc.locate(catalog_number, &["MarkInfo"])?;
    doc.dict_at_mut(&addr)?
        .insert("Marked", Object::Boolean(true));

    Ok(())
}

/// Creates one structure element (and, recursively, its children) as an
/// indirect object under `parent`
fn create_element(
    doc: &mut Document,
    node: &StructureNode,
    parent: Reference,
    index: &mut NodeIndex,
) -> PdfResult<Reference> {
    let mut dict = Dictionary::from_entries(vec![
        ("Type", Object::name("StructElem")),
        ("S", Object::name(node.role.clone())),
        ("P", Object::Reference(parent)),
    ]);

    if let Some(language) = &node.language {
        dict.insert("Lang", Object::string(language.clone()));
    }
    if let Some(alt) = &node.alt_text {
        dict.insert("Alt", Object::string(alt.clone()));
    }
    if let Some(actual) = &node.actual_text {
        dict.insert("ActualText", Object::string(actual.clone()));
    }
    if let Some(element_id) = &node.element_id {
        dict.insert("ID", Object::string(element_id.clone()));
    }

    if let Some(attrs) = assemble_attributes(node) {
        dict.insert("A", attrs);
    }

    let elem = doc.add_object(Object::Dictionary(dict));

    if let Some(id) = &node.id {
        index.insert(id.clone(), elem);
    }

    for child in &node.children {
        let kid = create_element(doc, child, elem, index)?;
        doc.object_mut(elem.object_number)
            .and_then(Object::as_dict_mut)
            .ok_or_else(|| PdfError::internal("structure element vanished"))?
            .push_to_array("K", Object::Reference(kid));
    }

    Ok(elem)
}

/// Builds the `/A` entry: a Layout attribute for the bbox, a Table
/// attribute for table fields, generic attributes grouped by owner.
/// Same-owner groups merge; one resulting dictionary is stored directly,
/// several as an array
fn assemble_attributes(node: &StructureNode) -> Option<Object> {
    let mut groups: Vec<(String, Dictionary)> = Vec::new();

    let mut group_mut = |groups: &mut Vec<(String, Dictionary)>, owner: &str| -> usize {
        if let Some(pos) = groups.iter().position(|(o, _)| o == owner) {
            return pos;
        }
        let mut dict = Dictionary::new();
        dict.insert("O", Object::name(owner));
        groups.push((owner.to_owned(), dict));
        groups.len() - 1
    };

    if let Some(bbox) = &node.bbox {
        let pos = group_mut(&mut groups, "Layout");
        groups[pos].1.insert(
            "BBox",
            Object::Array(vec![
                Object::Real(bbox.x),
                Object::Real(bbox.y),
                Object::Real(bbox.x + bbox.width),
                Object::Real(bbox.y + bbox.height),
            ]),
        );
    }

    if node.scope.is_some() || node.col_span.is_some() || node.row_span.is_some() {
        let pos = group_mut(&mut groups, "Table");
        if let Some(scope) = &node.scope {
            groups[pos].1.insert("Scope", Object::name(scope.clone()));
        }
        if let Some(col_span) = node.col_span {
            groups[pos].1.insert("ColSpan", Object::Integer(col_span));
        }
        if let Some(row_span) = node.row_span {
            groups[pos].1.insert("RowSpan", Object::Integer(row_span));
        }
    }

    for attr in &node.attributes {
        let pos = group_mut(&mut groups, &attr.owner);
        groups[pos]
            .1
            .insert(attr.key.clone(), Object::string(attr.value.clone()));
    }

    match groups.len() {
        0 => None,
        1 => Some(Object::Dictionary(groups.pop().unwrap().1)),
        _ => Some(Object::Array(
            groups
                .into_iter()
                .map(|(_, dict)| Object::Dictionary(dict))
                .collect(),
        )),
    }
}
