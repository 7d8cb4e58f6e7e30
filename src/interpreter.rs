use crate::{
    cancel::CancelToken,
    document::Document,
    error::{PdfError, PdfResult},
    handlers::{
        AnnotationHandler, ArtifactHandler, BookmarkHandler, ContentTaggingHandler, FontHandler,
        MetadataHandler, NodeIndex, OcrHandler, StructureHandler,
    },
    instructions::InstructionSet,
    objects::Object,
};

/// The value stamped into the info dictionary's `Processor` entry
pub const PROCESSOR: &str = concat!(
    "pdftag ",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/pdftag/pdftag)"
);

/// Runs the transformation handlers over one document in their fixed
/// dependency order and stamps the processor version.
///
/// Constructed once at the system boundary and reused across documents;
/// the node index produced by the structure handler flows as an explicit
/// parameter, never as ambient state
#[derive(Debug, Default)]
pub struct Interpreter {
    metadata: MetadataHandler,
    structure: StructureHandler,
    tagging: ContentTaggingHandler,
    artifact: ArtifactHandler,
    annotation: AnnotationHandler,
    font: FontHandler,
    ocr: OcrHandler,
    bookmark: BookmarkHandler,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `instructions` to `input` and returns the rewritten bytes.
    /// The first failing handler aborts the pipeline; nothing is emitted
    /// on failure
    pub fn execute(
        &self,
        input: &[u8],
        instructions: &InstructionSet,
        cancel: &CancelToken,
    ) -> PdfResult<Vec<u8>> {
        let mut doc = Document::load(input)?;

        if doc.is_encrypted() {
            return Err(PdfError::unsupported(
                "encrypted documents cannot be modified without credentials",
            ));
        }

        if let Some(metadata) = &instructions.metadata {
            self.metadata.apply(&mut doc, metadata)?;
        }

        let index = match &instructions.structure {
            Some(structure) => self.structure.apply(&mut doc, structure)?,
            None => NodeIndex::new(),
        };

        self.tagging
            .apply(&mut doc, &instructions.content_tagging, &index, cancel)?;
        self.artifact
            .apply(&mut doc, &instructions.artifacts, cancel)?;
        self.annotation
            .apply(&mut doc, &instructions.annotations, &index)?;
        self.font.apply(&mut doc, &instructions.fonts)?;
        self.ocr.apply(&mut doc, &instructions.ocr, cancel)?;

        if let Some(bookmarks) = &instructions.bookmarks {
            self.bookmark.apply(&mut doc, bookmarks, cancel)?;
        }

        doc.info_mut()?
            .insert("Processor", Object::string(PROCESSOR));

        doc.save()
    }
}
