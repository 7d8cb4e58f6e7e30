pub use annotation::AnnotationHandler;
pub use artifact::ArtifactHandler;
pub use bookmark::BookmarkHandler;
pub use font::FontHandler;
pub use metadata::MetadataHandler;
pub use ocr::OcrHandler;
pub use structure::{NodeIndex, StructureHandler};
pub use tagging::ContentTaggingHandler;

mod annotation;
mod artifact;
mod bookmark;
mod font;
mod metadata;
mod ocr;
mod structure;
mod tagging;
