pub mod video;

pub use video::{default_output_path, ConversionHandle, SlideExtractor};
