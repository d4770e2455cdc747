//! Skill extraction, embedding and scoring pipeline

pub mod batch;
pub mod dictionary;
pub mod document;
pub mod embeddings;
pub mod extractor;
pub mod ranking;
pub mod scorer;
pub mod text_processor;
