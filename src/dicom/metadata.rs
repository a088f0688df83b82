//! Flat descriptive metadata record for a DICOM file

use super::parser;
use super::open_dicom_file;
use dicom::core::Tag;
use dicom::dictionary_std::tags;
use dicom::object::DefaultDicomObject;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::path::Path;
use tracing::{debug, error};

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Integer,
}

/// Exported fields, in output order
const FIELDS: &[(&str, Tag, FieldKind)] = &[
    ("PatientName", tags::PATIENT_NAME, FieldKind::Text),
    ("PatientID", tags::PATIENT_ID, FieldKind::Text),
    ("PatientBirthDate", tags::PATIENT_BIRTH_DATE, FieldKind::Text),
    ("PatientSex", tags::PATIENT_SEX, FieldKind::Text),
    ("StudyDate", tags::STUDY_DATE, FieldKind::Text),
    ("StudyTime", tags::STUDY_TIME, FieldKind::Text),
    ("StudyDescription", tags::STUDY_DESCRIPTION, FieldKind::Text),
    ("Modality", tags::MODALITY, FieldKind::Text),
    ("ImageType", tags::IMAGE_TYPE, FieldKind::Text),
    ("PhotometricInterpretation", tags::PHOTOMETRIC_INTERPRETATION, FieldKind::Text),
    ("Rows", tags::ROWS, FieldKind::Integer),
    ("Columns", tags::COLUMNS, FieldKind::Integer),
    ("PixelSpacing", tags::PIXEL_SPACING, FieldKind::Text),
    ("WindowCenter", tags::WINDOW_CENTER, FieldKind::Text),
    ("WindowWidth", tags::WINDOW_WIDTH, FieldKind::Text),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
}

impl Serialize for MetadataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetadataValue::Text(s) => serializer.serialize_str(s),
            MetadataValue::Integer(v) => serializer.serialize_i64(*v),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(s) => f.write_str(s),
            MetadataValue::Integer(v) => write!(f, "{v}"),
        }
    }
}

/// Field name and value pairs, in a fixed order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DicomMetadata {
    fields: Vec<(&'static str, MetadataValue)>,
}

impl DicomMetadata {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetadataValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &MetadataValue)> {
        self.fields.iter().map(|(name, value)| (*name, value))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for DicomMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Metadata of a file, or the reason it could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataRecord {
    Complete(DicomMetadata),
    Unreadable { error: String },
}

impl Serialize for MetadataRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetadataRecord::Complete(metadata) => metadata.serialize(serializer),
            MetadataRecord::Unreadable { error } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

/// Read every exported field, substituting a default for each absent one
#[must_use]
pub fn extract_metadata(obj: &DefaultDicomObject) -> DicomMetadata {
    let fields = FIELDS
        .iter()
        .map(|&(name, tag, kind)| {
            let value = match kind {
                FieldKind::Text => parser::read_text(obj, tag).map(MetadataValue::Text),
                FieldKind::Integer => parser::read_int(obj, tag).map(MetadataValue::Integer),
            };
            let value = value.unwrap_or_else(|| {
                debug!("Metadata field {name} is absent");
                match kind {
                    FieldKind::Text => MetadataValue::Text(UNKNOWN.to_string()),
                    FieldKind::Integer => MetadataValue::Integer(0),
                }
            });
            (name, value)
        })
        .collect();

    DicomMetadata { fields }
}

/// Decode the file and extract its metadata; never fails
pub fn read_metadata(path: &Path) -> MetadataRecord {
    match open_dicom_file(path) {
        Ok(obj) => MetadataRecord::Complete(extract_metadata(&obj)),
        Err(e) => {
            error!("Failed to extract DICOM metadata: {e}");
            MetadataRecord::Unreadable {
                error: e.to_string(),
            }
        }
    }
}
