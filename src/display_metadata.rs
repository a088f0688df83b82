use crate::dicom::{DicomMetadata, MetadataRecord};
use std::fmt::Write;

/// Print the record as aligned `name: value` lines
pub fn print_metadata(record: &MetadataRecord) {
    print!("{}", format_metadata(record));
}

#[must_use]
pub fn format_metadata(record: &MetadataRecord) -> String {
    match record {
        MetadataRecord::Complete(metadata) => format_fields(metadata),
        MetadataRecord::Unreadable { error } => format!("{:26}: {error}\n", "Error"),
    }
}

fn format_fields(metadata: &DicomMetadata) -> String {
    let mut out = String::new();
    for (name, value) in metadata.iter() {
        // infallible for String
        let _ = writeln!(out, "{name:26}: {value}");
    }
    out
}
