pub mod cleanup;
pub mod cli;
pub mod convert;
pub mod dicom;
pub mod display_metadata;
pub mod error;
pub mod handler;
pub mod image;
pub mod source;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export commonly used functions
pub use convert::{convert_to_jpeg, convert_with_options, ConvertOptions};
pub use display_metadata::print_metadata;
pub use error::ConversionError;
pub use types::Quality;
