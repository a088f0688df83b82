//! Synthetic DICOM datasets and a one-shot HTTP server for tests

use dicom::core::value::PrimitiveValue;
use dicom::core::{DataElement, Tag, VR};
use dicom::dictionary_std::tags;
use dicom::object::{DefaultDicomObject, FileMetaTableBuilder, InMemDicomObject};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread;

const SECONDARY_CAPTURE: &str = "1.2.840.10008.5.1.4.1.1.7";
const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";
const EXPLICIT_VR_BE: &str = "1.2.840.10008.1.2.2";

/// Builder for small uncompressed datasets
pub struct DatasetBuilder {
    obj: InMemDicomObject,
    transfer_syntax: &'static str,
}

impl DatasetBuilder {
    fn new(rows: u16, columns: u16, samples_per_pixel: u16, bits: u16, signed: bool) -> Self {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(SECONDARY_CAPTURE),
        ));
        obj.put(DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from("2.25.1234567890"),
        ));
        obj.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(rows)));
        obj.put(DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(columns)));
        obj.put(DataElement::new(
            tags::SAMPLES_PER_PIXEL,
            VR::US,
            PrimitiveValue::from(samples_per_pixel),
        ));
        obj.put(DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(bits)));
        obj.put(DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(bits)));
        obj.put(DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(bits - 1)));
        obj.put(DataElement::new(
            tags::PIXEL_REPRESENTATION,
            VR::US,
            PrimitiveValue::from(u16::from(signed)),
        ));
        let photometric = if samples_per_pixel == 3 { "RGB" } else { "MONOCHROME2" };
        obj.put(DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            PrimitiveValue::from(photometric),
        ));
        if samples_per_pixel == 3 {
            obj.put(DataElement::new(
                tags::PLANAR_CONFIGURATION,
                VR::US,
                PrimitiveValue::from(0_u16),
            ));
        }

        Self {
            obj,
            transfer_syntax: EXPLICIT_VR_LE,
        }
    }

    pub fn grayscale_u8(rows: u16, columns: u16, pixels: &[u8]) -> Self {
        Self::new(rows, columns, 1, 8, false).pixel_bytes(pixels.to_vec(), VR::OB)
    }

    pub fn grayscale_u16(rows: u16, columns: u16, pixels: &[u16]) -> Self {
        let bytes = pixels.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(rows, columns, 1, 16, false).pixel_bytes(bytes, VR::OW)
    }

    /// 16-bit samples kept as `US` words, encoded by the writer in the file's byte order
    pub fn grayscale_u16_words(rows: u16, columns: u16, pixels: &[u16]) -> Self {
        let mut builder = Self::new(rows, columns, 1, 16, false);
        builder.obj.put(DataElement::new(
            tags::PIXEL_DATA,
            VR::OW,
            PrimitiveValue::U16(pixels.iter().copied().collect()),
        ));
        builder
    }

    pub fn grayscale_i16(rows: u16, columns: u16, pixels: &[i16]) -> Self {
        let bytes = pixels.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(rows, columns, 1, 16, true).pixel_bytes(bytes, VR::OW)
    }

    /// Interleaved 8-bit RGB samples
    pub fn rgb_u8(rows: u16, columns: u16, samples: &[u8]) -> Self {
        Self::new(rows, columns, 3, 8, false).pixel_bytes(samples.to_vec(), VR::OB)
    }

    fn pixel_bytes(mut self, bytes: Vec<u8>, vr: VR) -> Self {
        self.obj
            .put(DataElement::new(tags::PIXEL_DATA, vr, PrimitiveValue::from(bytes)));
        self
    }

    pub fn frames(mut self, frames: u32) -> Self {
        self.obj.put(DataElement::new(
            tags::NUMBER_OF_FRAMES,
            VR::IS,
            PrimitiveValue::from(frames.to_string()),
        ));
        self
    }

    pub fn photometric(mut self, value: &str) -> Self {
        self.obj.put(DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            PrimitiveValue::from(value),
        ));
        self
    }

    pub fn planar(mut self, value: u16) -> Self {
        self.obj.put(DataElement::new(
            tags::PLANAR_CONFIGURATION,
            VR::US,
            PrimitiveValue::from(value),
        ));
        self
    }

    pub fn bits_stored(mut self, bits: u16) -> Self {
        self.obj.put(DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(bits)));
        self.obj.put(DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(bits - 1)));
        self
    }

    pub fn rescale(self, slope: f64, intercept: f64) -> Self {
        self.text(tags::RESCALE_SLOPE, &slope.to_string())
            .text(tags::RESCALE_INTERCEPT, &intercept.to_string())
    }

    pub fn window(self, center: f64, width: f64) -> Self {
        self.text(tags::WINDOW_CENTER, &center.to_string())
            .text(tags::WINDOW_WIDTH, &width.to_string())
    }

    /// Put a text element; backslashes separate multiple values
    pub fn text(mut self, tag: Tag, value: &str) -> Self {
        let values: Vec<String> = value.split('\\').map(str::to_string).collect();
        let value = if values.len() == 1 {
            PrimitiveValue::from(value)
        } else {
            PrimitiveValue::Strs(values.into_iter().collect())
        };
        self.obj.put(DataElement::new(tag, text_vr(tag), value));
        self
    }

    /// Write with the Explicit VR Big Endian transfer syntax
    pub fn big_endian(mut self) -> Self {
        self.transfer_syntax = EXPLICIT_VR_BE;
        self
    }

    pub fn without(mut self, tag: Tag) -> Self {
        self.obj.remove_element(tag);
        self
    }

    pub fn build(self) -> DefaultDicomObject {
        self.obj
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(self.transfer_syntax)
                    .media_storage_sop_class_uid(SECONDARY_CAPTURE)
                    .media_storage_sop_instance_uid("2.25.1234567890"),
            )
            .expect("valid file meta group")
    }

    /// Write the dataset as a DICOM file and return its path
    pub fn write(self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        self.build()
            .write_to_file(&path)
            .expect("test dataset should be writable");
        path
    }
}

fn text_vr(tag: Tag) -> VR {
    match tag {
        tags::WINDOW_CENTER
        | tags::WINDOW_WIDTH
        | tags::RESCALE_SLOPE
        | tags::RESCALE_INTERCEPT
        | tags::PIXEL_SPACING => VR::DS,
        tags::PATIENT_NAME => VR::PN,
        tags::PATIENT_BIRTH_DATE | tags::STUDY_DATE => VR::DA,
        tags::STUDY_TIME => VR::TM,
        tags::PATIENT_SEX
        | tags::MODALITY
        | tags::IMAGE_TYPE
        | tags::VOILUT_FUNCTION
        | tags::PHOTOMETRIC_INTERPRETATION => VR::CS,
        _ => VR::LO,
    }
}

/// 16-bit ramp covering `0..=max` across `rows * columns` pixels
pub fn ramp_u16(rows: usize, columns: usize, max: u16) -> Vec<u16> {
    let count = rows * columns;
    (0..count)
        .map(|i| ((i as f64 / (count - 1) as f64) * f64::from(max)).round() as u16)
        .collect()
}

/// Serve one canned HTTP response on a local port; returns the base URL
pub fn serve_once(status: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = [0_u8; 1024];
        let _ = stream.read(&mut request);
        let header = format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(header.as_bytes()).unwrap();
        stream.write_all(&body).unwrap();
    });
    format!("http://{addr}")
}
