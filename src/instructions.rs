//! The validated instruction tree consumed by the interpreter.
//!
//! Hosts deserialize and schema-validate instructions before handing them
//! over; the types here assume well-formed input and carry no validation
//! of their own.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstructionSet {
    pub metadata: Option<MetadataInstruction>,
    pub structure: Option<StructureInstruction>,
    pub content_tagging: Vec<ContentTagInstruction>,
    pub artifacts: Vec<ArtifactInstruction>,
    pub annotations: Vec<AnnotationInstruction>,
    pub fonts: Vec<FontInstruction>,
    pub ocr: Vec<OcrInstruction>,
    pub bookmarks: Option<BookmarkInstruction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataInstruction {
    pub language: Option<String>,
    pub title: Option<String>,
    pub display_doc_title: Option<bool>,
    pub mark_info: Option<bool>,
    pub pdf_ua_identifier: Option<i64>,
    pub tab_order: Option<TabOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabOrder {
    Structure,
    Row,
    Column,
    Unordered,
}

impl TabOrder {
    /// The page `/Tabs` value
    pub fn pdf_name(&self) -> &'static str {
        match self {
            TabOrder::Structure => "S",
            TabOrder::Row => "R",
            TabOrder::Column => "C",
            TabOrder::Unordered => "W",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructureInstruction {
    pub strip_existing: bool,
    pub root: String,
    pub children: Vec<StructureNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructureNode {
    /// Caller-supplied identifier; nodes without one are created but not
    /// addressable by later instructions
    pub id: Option<String>,
    pub role: String,
    pub language: Option<String>,
    pub alt_text: Option<String>,
    pub actual_text: Option<String>,
    pub element_id: Option<String>,
    pub bbox: Option<Bbox>,
    pub scope: Option<String>,
    pub col_span: Option<i64>,
    pub row_span: Option<i64>,
    pub attributes: Vec<AttributeSpec>,
    pub children: Vec<StructureNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSpec {
    pub owner: String,
    pub key: String,
    pub value: String,
}

/// A rectangle in PDF user units, origin at the lower left
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bbox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTagInstruction {
    /// Identifier of the owning structure node
    pub node: String,
    /// 1-based page number
    pub page: usize,
    pub bbox: Bbox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInstruction {
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub page: usize,
    pub bbox: Bbox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AnnotationInstruction {
    SetContents {
        page: usize,
        index: usize,
        value: String,
    },
    SetTu {
        page: usize,
        index: usize,
        value: String,
    },
    Associate {
        page: usize,
        index: usize,
        node: String,
    },
    CreateWidget {
        page: usize,
        field_name: String,
        field_type: String,
        tu: Option<String>,
        rect: Bbox,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FontInstruction {
    WriteCidset {
        page: usize,
        font: String,
        cids: Vec<u32>,
    },
    WriteCharset {
        page: usize,
        font: String,
        glyph_names: Vec<String>,
    },
    SetEncoding {
        page: usize,
        font: String,
        encoding: String,
    },
    SetDifferences {
        page: usize,
        font: String,
        differences: BTreeMap<u32, String>,
    },
    WriteTounicode {
        page: usize,
        font: String,
        mappings: BTreeMap<u32, String>,
    },
    SetWidths {
        page: usize,
        font: String,
        widths: BTreeMap<u32, f32>,
    },
    AddFontDescriptor {
        page: usize,
        font: String,
    },
}

impl FontInstruction {
    pub fn locator(&self) -> (usize, &str) {
        match self {
            FontInstruction::WriteCidset { page, font, .. }
            | FontInstruction::WriteCharset { page, font, .. }
            | FontInstruction::SetEncoding { page, font, .. }
            | FontInstruction::SetDifferences { page, font, .. }
            | FontInstruction::WriteTounicode { page, font, .. }
            | FontInstruction::SetWidths { page, font, .. }
            | FontInstruction::AddFontDescriptor { page, font } => (*page, font),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrInstruction {
    pub page: usize,
    pub words: Vec<OcrWord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrWord {
    pub text: String,
    pub bbox: Bbox,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookmarkInstruction {
    pub generate_from_headings: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let json = r#"{
            "metadata": {"language": "en-US", "title": "T", "displayDocTitle": true, "markInfo": true, "pdfUaIdentifier": 1, "tabOrder": "structure"},
            "structure": {"stripExisting": false, "root": "Document", "children": [{"id": "h1", "role": "H1"}]},
            "contentTagging": [{"node": "h1", "page": 1, "bbox": {"x": 72, "y": 699, "width": 80, "height": 14}}],
            "artifacts": [{"type": "header", "page": 1, "bbox": {"x": 0, "y": 780, "width": 612, "height": 12}}],
            "annotations": [{"op": "associate", "page": 1, "index": 0, "node": "h1"}],
            "fonts": [{"op": "write_cidset", "page": 1, "font": "F1", "cids": [0, 1, 5, 10]}],
            "ocr": [{"page": 1, "words": [{"text": "HELLO", "bbox": {"x": 72, "y": 720, "width": 60, "height": 14}}]}],
            "bookmarks": {"generateFromHeadings": true}
        }"#;

        let set: InstructionSet = serde_json::from_str(json).unwrap();

        assert_eq!(set.metadata.as_ref().unwrap().tab_order, Some(TabOrder::Structure));
        assert_eq!(set.structure.as_ref().unwrap().children[0].id.as_deref(), Some("h1"));
        assert_eq!(set.content_tagging[0].page, 1);
        assert_eq!(set.artifacts[0].artifact_type, "header");
        assert!(matches!(
            set.annotations[0],
            AnnotationInstruction::Associate { index: 0, .. }
        ));
        assert!(matches!(
            &set.fonts[0],
            FontInstruction::WriteCidset { cids, .. } if cids == &[0, 1, 5, 10]
        ));
        assert!(set.bookmarks.unwrap().generate_from_headings);
    }

    #[test]
    fn empty_object_is_a_valid_no_op_set() {
        let set: InstructionSet = serde_json::from_str("{}").unwrap();
        assert!(set.metadata.is_none());
        assert!(set.content_tagging.is_empty());
    }

    #[test]
    fn tab_order_maps_to_pdf_names() {
        assert_eq!(TabOrder::Structure.pdf_name(), "S");
        assert_eq!(TabOrder::Row.pdf_name(), "R");
        assert_eq!(TabOrder::Column.pdf_name(), "C");
        assert_eq!(TabOrder::Unordered.pdf_name(), "W");
    }
}
