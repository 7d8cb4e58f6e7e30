//! The language-neutral inspection report. Serialized as camelCase JSON;
//! absent analytic fields stay `null` or empty rather than failing the
//! whole inspection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionReport {
    /// Lowercase hex SHA-256 of the source bytes
    pub file_hash: String,
    pub file_size: u64,
    pub document: DocumentInfo,
    /// Base64-encoded XMP packet bytes
    pub xmp_metadata: Option<String>,
    pub structure_tree: Vec<StructureNodeReport>,
    pub role_map: BTreeMap<String, String>,
    pub pages: Vec<PageReport>,
    pub fonts: Vec<FontReport>,
    pub outlines: Vec<OutlineReport>,
    pub embedded_files: Vec<EmbeddedFileReport>,
    pub optional_content_configs: Vec<OptionalContentConfigReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub is_tagged: bool,
    pub page_count: usize,
    pub pdf_version: String,
    pub language: Option<String>,
    pub title: Option<String>,
    pub display_doc_title: bool,
    pub mark_info_marked: bool,
    pub suspect_flag: bool,
    pub has_info_dictionary: bool,
    pub is_encrypted: bool,
    pub encryption_permissions: Option<i64>,
    pub has_structural_parent_tree: bool,
    pub has_xfa_dynamic_render: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureNodeReport {
    pub role: String,
    pub id: Option<String>,
    pub alt_text: Option<String>,
    pub actual_text: Option<String>,
    pub language: Option<String>,
    pub has_bbox: bool,
    /// Keyed `owner:key` when the attribute dictionary carries an `/O`
    /// owner, bare `key` otherwise
    pub attributes: BTreeMap<String, AttributeValue>,
    /// 1-based number of the nearest page this node renders on
    pub page: Option<usize>,
    pub first_mcid: Option<i64>,
    pub children: Vec<StructureNodeReport>,
}

/// PDF attribute primitives converted into the report value model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<AttributeValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageReport {
    pub page_number: usize,
    pub width: f32,
    pub height: f32,
    pub tab_order: Option<String>,
    pub font_names: Vec<String>,
    /// Sorted, deduplicated MCIDs the structure tree references on this
    /// page
    pub structured_mcids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontReport {
    pub name: String,
    pub font_type: Option<String>,
    pub is_embedded: bool,
    pub is_symbolic: bool,
    pub has_to_unicode: bool,
    /// Only known for embedded programs the analyzer understands
    pub has_notdef_glyph: Option<bool>,
    pub encoding: Option<String>,
    pub has_charset: bool,
    pub has_cidset: bool,
    pub has_font_descriptor: bool,
    pub cid_system_info: Option<CidSystemInfoReport>,
    pub cmap_info: Option<CmapInfoReport>,
    pub cid_to_gid_map: Option<String>,
    pub encoding_detail: Option<EncodingDetailReport>,
    /// Subtable headers of the embedded TrueType program's `cmap` table
    pub cmap_subtables: Vec<CmapSubtableReport>,
    /// Parsed ToUnicode mappings, source hex to destination text
    pub to_unicode: BTreeMap<String, String>,
    /// Type3 character codes with no ToUnicode mapping
    pub unmappable_codes: Vec<u32>,
    pub type3: Option<Type3Report>,
    pub type1_glyph_names: Vec<String>,
    /// base64(gzip(program bytes)) of the embedded FontFile
    pub font_program_data: Option<String>,
    /// Sorted 1-based pages the font appears on
    pub pages: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CidSystemInfoReport {
    pub registry: Option<String>,
    pub ordering: Option<String>,
    pub supplement: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmapInfoReport {
    pub name: String,
    pub is_identity: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingDetailReport {
    pub base_encoding: Option<String>,
    /// Glyph names appearing in the `/Differences` array
    pub differences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmapSubtableReport {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub format: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Type3Report {
    pub char_procs: Vec<String>,
    pub font_matrix: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineReport {
    pub title: String,
    /// 1-based destination page when it resolves
    pub page: Option<usize>,
    pub children: Vec<OutlineReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedFileReport {
    pub name: String,
    pub has_f: bool,
    pub has_uf: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionalContentConfigReport {
    pub name: Option<String>,
    pub creator: Option<String>,
    pub base_state: Option<String>,
    pub on_count: usize,
    pub off_count: usize,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn report_keys_are_camel_cased() {
        let info = DocumentInfo {
            is_tagged: false,
            page_count: 1,
            pdf_version: "1.7".to_owned(),
            language: None,
            title: None,
            display_doc_title: false,
            mark_info_marked: false,
            suspect_flag: false,
            has_info_dictionary: false,
            is_encrypted: false,
            encryption_permissions: None,
            has_structural_parent_tree: false,
            has_xfa_dynamic_render: false,
        };

        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("isTagged").is_some());
        assert!(json.get("pageCount").is_some());
        assert!(json.get("hasXfaDynamicRender").is_some());
        assert!(json.get("is_tagged").is_none());
    }

    #[test]
    fn attribute_values_serialize_untagged() {
        let value = AttributeValue::List(vec![
            AttributeValue::Text("Block".to_owned()),
            AttributeValue::Number(2.0),
            AttributeValue::Bool(true),
        ]);

        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"["Block",2.0,true]"#
        );
    }
}
