//! Input processing module
//! Handles file detection, size limits, and decoding documents to text

pub mod file_detector;
pub mod manager;
pub mod text_extractor;

pub use file_detector::FileType;
pub use manager::{collect_documents, load_candidates, read_document, LoadedFile};
pub use text_extractor::{DocumentDecoder, FileDecoder};
