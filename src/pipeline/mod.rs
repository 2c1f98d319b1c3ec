pub mod batch_extraction;
pub mod extractor;
pub mod source;
