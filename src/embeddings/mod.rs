// Text extraction, chunking and similarity search

pub mod document_processor;
pub mod text_chunker;
pub mod vector_search;

pub use document_processor::*;
pub use text_chunker::*;
pub use vector_search::*;
