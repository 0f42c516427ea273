pub mod document;
pub mod video;

pub use document::DocumentExporter;
