pub mod annotate;
pub mod extractor;
