use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use exif::{Field, In, Tag, Value};
use serde::Serialize;

use crate::{
    coords::convert_coord,
    error::{MetadataError, SkipReason},
    geocode::AddressComponents,
};

/// Tag names kept from an image's metadata; everything else is dropped.
pub const GPS_TAGS: [&str; 11] = [
    "FileName",
    "DateTimeOriginal",
    "GPSVersion",
    "GPSLatitudeRef",
    "GPSLatitude",
    "GPSLongitudeRef",
    "GPSLongitude",
    "GPSAltitudeRef",
    "GPSAltitude",
    "GPSMeasureMode",
    "GPSDOP",
];

const EXIF_TAGS: [(Tag, &str); 10] = [
    (Tag::DateTimeOriginal, "DateTimeOriginal"),
    (Tag::GPSVersionID, "GPSVersion"),
    (Tag::GPSLatitudeRef, "GPSLatitudeRef"),
    (Tag::GPSLatitude, "GPSLatitude"),
    (Tag::GPSLongitudeRef, "GPSLongitudeRef"),
    (Tag::GPSLongitude, "GPSLongitude"),
    (Tag::GPSAltitudeRef, "GPSAltitudeRef"),
    (Tag::GPSAltitude, "GPSAltitude"),
    (Tag::GPSMeasureMode, "GPSMeasureMode"),
    (Tag::GPSDOP, "GPSDOP"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    /// Ordered components, e.g. degrees/minutes/seconds as "N/D" strings.
    Components(Vec<String>),
}

impl TagValue {
    pub fn as_text(&self) -> String {
        match self {
            TagValue::Text(text) => text.clone(),
            TagValue::Components(parts) => parts.join(","),
        }
    }

    /// Component `idx`, or "0" when the value is shorter than that.
    fn component(&self, idx: usize) -> &str {
        match self {
            TagValue::Text(text) if idx == 0 => text.as_str(),
            TagValue::Text(_) => "0",
            TagValue::Components(parts) => parts.get(idx).map(String::as_str).unwrap_or("0"),
        }
    }
}

/// The GPS related subset of an image's metadata, keyed by tag name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpsTags(BTreeMap<&'static str, TagValue>);

impl GpsTags {
    pub fn new() -> GpsTags {
        GpsTags::default()
    }

    /// Stores `value` if `name` is one of [`GPS_TAGS`]; returns whether it was kept.
    pub fn insert(&mut self, name: &str, value: TagValue) -> bool {
        match GPS_TAGS.iter().find(|known| **known == name) {
            Some(known) => {
                self.0.insert(*known, value);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&TagValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn required(&self, name: &'static str) -> Result<&TagValue, SkipReason> {
        self.get(name).ok_or(SkipReason::NoGps(name))
    }
}

impl<S: AsRef<str>> FromIterator<(S, TagValue)> for GpsTags {
    fn from_iter<I: IntoIterator<Item = (S, TagValue)>>(iter: I) -> Self {
        let mut tags = GpsTags::new();
        for (name, value) in iter {
            tags.insert(name.as_ref(), value);
        }
        tags
    }
}

/// Source of raw metadata tags for an image.
pub trait MetadataReader {
    fn read(&self, path: &Path) -> Result<GpsTags, MetadataError>;
}

/// Reads tags with kamadak-exif. FileName comes from the path since EXIF
/// does not store it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifReader;

impl MetadataReader for ExifReader {
    fn read(&self, path: &Path) -> Result<GpsTags, MetadataError> {
        let mut tags = GpsTags::new();
        if let Some(name) = path.file_name() {
            tags.insert("FileName", TagValue::Text(name.to_string_lossy().into_owned()));
        }

        let file = File::open(path)?;
        let mut bufreader = BufReader::new(&file);
        let exif = match exif::Reader::new().read_from_container(&mut bufreader) {
            Ok(exif) => exif,
            // No Exif block at all, so no GPS either
            Err(exif::Error::NotFound(_)) => return Ok(tags),
            Err(e) => return Err(e.into()),
        };

        for (tag, name) in EXIF_TAGS {
            if let Some(field) = exif.get_field(tag, In::PRIMARY) {
                tags.insert(name, field_to_tag_value(field));
            }
        }
        Ok(tags)
    }
}

fn field_to_tag_value(field: &Field) -> TagValue {
    match &field.value {
        Value::Ascii(lines) => TagValue::Text(
            lines
                .iter()
                .map(|line| String::from_utf8_lossy(line).trim_end_matches('\0').to_string())
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Value::Rational(rationals) => TagValue::Components(
            rationals
                .iter()
                .map(|r| format!("{}/{}", r.num, r.denom))
                .collect(),
        ),
        Value::SRational(rationals) => TagValue::Components(
            rationals
                .iter()
                .map(|r| format!("{}/{}", r.num, r.denom))
                .collect(),
        ),
        Value::Byte(bytes) if bytes.len() == 1 => TagValue::Text(bytes[0].to_string()),
        Value::Byte(bytes) => TagValue::Components(bytes.iter().map(u8::to_string).collect()),
        _ => TagValue::Text(field.display_value().to_string()),
    }
}

/// One image's position on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub name: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "AddressComponents::is_empty")]
    pub address_components: AddressComponents,
}

impl LocationRecord {
    /// Builds a record from raw tags. All three axes and their reference
    /// fields must be present.
    pub fn from_tags(tags: &GpsTags) -> Result<LocationRecord, SkipReason> {
        let latitude = tags.required("GPSLatitude")?;
        let longitude = tags.required("GPSLongitude")?;
        let altitude = tags.required("GPSAltitude")?;
        let latitude_ref = tags.required("GPSLatitudeRef")?;
        let longitude_ref = tags.required("GPSLongitudeRef")?;
        let altitude_ref = tags.required("GPSAltitudeRef")?;

        Ok(LocationRecord {
            latitude: axis_to_f64(latitude, latitude_ref)?,
            longitude: axis_to_f64(longitude, longitude_ref)?,
            altitude: axis_to_f64(altitude, altitude_ref)?,
            name: text_or_empty(tags, "FileName"),
            timestamp: text_or_empty(tags, "DateTimeOriginal"),
            address_components: AddressComponents::default(),
        })
    }

    pub fn with_address_components(self, address_components: AddressComponents) -> LocationRecord {
        LocationRecord {
            address_components,
            ..self
        }
    }
}

fn axis_to_f64(value: &TagValue, reference: &TagValue) -> Result<f64, SkipReason> {
    Ok(convert_coord(
        value.component(0),
        value.component(1),
        value.component(2),
        &reference.as_text(),
    )?)
}

fn text_or_empty(tags: &GpsTags, name: &str) -> String {
    tags.get(name).map(TagValue::as_text).unwrap_or_default()
}

/// Reads `path` through `reader` and turns its GPS tags into a record.
pub fn extract<R: MetadataReader + ?Sized>(
    reader: &R,
    path: &Path,
) -> Result<LocationRecord, SkipReason> {
    if !path.exists() {
        return Err(SkipReason::NotFound);
    }
    let tags = reader.read(path)?;
    LocationRecord::from_tags(&tags)
}
