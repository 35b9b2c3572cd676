use std::path::{Path, PathBuf};

use log::{debug, warn};
use once_cell::unsync::OnceCell;

pub use error::{ConfigError, CoordError, GeocodeError, MetadataError, SkipReason};
pub use geocode::{AddressComponents, GoogleGeocoder, ReverseGeocoder};
pub use photo_metadata::{extract, ExifReader, GpsTags, LocationRecord, MetadataReader, TagValue};
pub use static_map::{MappingOptions, DEFAULT_SIZE, DEFAULT_ZOOM};

pub mod coords;
pub mod error;
pub mod geocode;
pub mod photo_metadata;
pub mod static_map;

const IMAGE_PATTERN: &str = "**/*.{jpg,jpeg,tif,tiff,heic,heif,png,webp}";

/// One image or an ordered list of them.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePaths {
    Single(PathBuf),
    Many(Vec<PathBuf>),
}

impl ImagePaths {
    pub fn as_slice(&self) -> &[PathBuf] {
        match self {
            ImagePaths::Single(path) => std::slice::from_ref(path),
            ImagePaths::Many(paths) => paths.as_slice(),
        }
    }
}

impl From<PathBuf> for ImagePaths {
    fn from(path: PathBuf) -> Self {
        ImagePaths::Single(path)
    }
}

impl From<&Path> for ImagePaths {
    fn from(path: &Path) -> Self {
        ImagePaths::Single(path.to_path_buf())
    }
}

impl From<Vec<PathBuf>> for ImagePaths {
    fn from(paths: Vec<PathBuf>) -> Self {
        ImagePaths::Many(paths)
    }
}

#[derive(Debug)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Result of processing a set of images.
#[derive(Debug, Default)]
pub struct Batch {
    /// Records sorted by timestamp, ties in input order.
    pub locations: Vec<LocationRecord>,
    pub skipped: Vec<Skipped>,
    /// Records left without address components because the lookup failed.
    pub geocode_failures: usize,
}

#[derive(Debug, PartialEq)]
pub enum Output {
    /// No image path was configured.
    Empty,
    Locations(Vec<LocationRecord>),
    MapUrl(String),
}

enum Geocoding {
    /// Google client, built on the first lookup. `None` once building failed.
    Google(OnceCell<Option<GoogleGeocoder>>),
    Custom(Box<dyn ReverseGeocoder>),
    Off,
}

pub struct Locator {
    api_key: String,
    image_paths: Option<ImagePaths>,
    options: MappingOptions,
    reader: Box<dyn MetadataReader>,
    geocoding: Geocoding,
}

impl Locator {
    /// Reads with [`ExifReader`] and enriches through [`GoogleGeocoder`],
    /// whose HTTP client is only built when the first lookup happens.
    pub fn new(
        api_key: &str,
        image_paths: Option<ImagePaths>,
        zoom: u32,
        size: &str,
    ) -> Result<Locator, ConfigError> {
        let options = MappingOptions::new(zoom, size)?;
        Ok(Locator {
            api_key: api_key.to_string(),
            image_paths,
            options,
            reader: Box::new(ExifReader),
            geocoding: Geocoding::Google(OnceCell::new()),
        })
    }

    pub fn with_reader<R: MetadataReader + 'static>(mut self, reader: R) -> Locator {
        self.reader = Box::new(reader);
        self
    }

    pub fn with_geocoder<G: ReverseGeocoder + 'static>(mut self, geocoder: G) -> Locator {
        self.geocoding = Geocoding::Custom(Box::new(geocoder));
        self
    }

    pub fn without_geocoding(mut self) -> Locator {
        self.geocoding = Geocoding::Off;
        self
    }

    pub fn options(&self) -> &MappingOptions {
        &self.options
    }

    /// Extracts, enriches and sorts the given images. Images without usable
    /// GPS data are skipped and reported in [`Batch::skipped`].
    pub fn process(&self, paths: &ImagePaths) -> Batch {
        let mut batch = Batch::default();

        for path in paths.as_slice() {
            debug!("{}", path.display());
            match extract(self.reader.as_ref(), path) {
                Ok(record) => {
                    let record = self.enrich(record, &mut batch.geocode_failures);
                    debug!(
                        "Found position for {}: ({}, {})",
                        path.display(),
                        record.latitude,
                        record.longitude
                    );
                    batch.locations.push(record);
                }
                Err(reason) => {
                    match &reason {
                        SkipReason::NoGps(_) => debug!("Skipping {}: {}", path.display(), reason),
                        _ => warn!("Skipping {}: {}", path.display(), reason),
                    }
                    batch.skipped.push(Skipped {
                        path: path.clone(),
                        reason,
                    });
                }
            }
        }

        // Stable, so equal timestamps keep their input order
        batch
            .locations
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        batch
    }

    /// Processes the configured images, `None` if there are none.
    pub fn batch(&self) -> Option<Batch> {
        self.image_paths.as_ref().map(|paths| self.process(paths))
    }

    pub fn map_url(&self, locations: &[LocationRecord]) -> String {
        static_map::map_url(locations, &self.options, &self.api_key)
    }

    /// Sorted records, or with `mapping` a static map URL of them.
    pub fn init(&self, mapping: bool) -> Output {
        let Some(batch) = self.batch() else {
            return Output::Empty;
        };
        if mapping {
            Output::MapUrl(self.map_url(&batch.locations))
        } else {
            Output::Locations(batch.locations)
        }
    }

    fn enrich(&self, record: LocationRecord, failures: &mut usize) -> LocationRecord {
        let geocoder: &dyn ReverseGeocoder = match &self.geocoding {
            Geocoding::Off => return record,
            Geocoding::Custom(geocoder) => geocoder.as_ref(),
            Geocoding::Google(cell) => {
                let google = cell.get_or_init(|| match GoogleGeocoder::new(&self.api_key) {
                    Ok(geocoder) => Some(geocoder),
                    Err(e) => {
                        warn!("Geocoding disabled: {}", e);
                        None
                    }
                });
                match google {
                    Some(geocoder) => geocoder as &dyn ReverseGeocoder,
                    None => {
                        *failures += 1;
                        return record;
                    }
                }
            }
        };
        match geocoder.lookup(record.latitude, record.longitude) {
            Ok(address_components) => record.with_address_components(address_components),
            Err(e) => {
                warn!("No address for {}: {}", record.name, e);
                *failures += 1;
                record
            }
        }
    }
}

/// Image files under `src_root`, sorted.
pub fn visit_paths(src_root: &Path) -> Result<Vec<PathBuf>, globwalk::GlobError> {
    let mut paths: Vec<PathBuf> = globwalk::GlobWalkerBuilder::from_patterns(src_root, &[IMAGE_PATTERN])
        .case_insensitive(true)
        .file_type(globwalk::FileType::FILE)
        .build()?
        .filter_map(Result::ok)
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();
    Ok(paths)
}

/// Replaces each directory in `inputs` with the images under it.
pub fn expand_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, globwalk::GlobError> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            paths.extend(visit_paths(input)?);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, fs};

    use tempfile::tempdir;

    use super::*;
    use crate::photo_metadata::tests::{sample_tags, write_sample_tiff};

    struct FakeReader(HashMap<PathBuf, GpsTags>);

    impl MetadataReader for FakeReader {
        fn read(&self, path: &Path) -> Result<GpsTags, MetadataError> {
            Ok(self.0.get(path).cloned().unwrap_or_default())
        }
    }

    struct FakeGeocoder;

    impl ReverseGeocoder for FakeGeocoder {
        fn lookup(&self, latitude: f64, _longitude: f64) -> Result<AddressComponents, GeocodeError> {
            if latitude < 0.0 {
                return Err(GeocodeError::NoResult);
            }
            let mut address = AddressComponents::default();
            address.insert("country", "Somewhere");
            Ok(address)
        }
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    fn locator(paths: Option<ImagePaths>, reader: FakeReader) -> Locator {
        Locator::new("key", paths, DEFAULT_ZOOM, DEFAULT_SIZE)
            .unwrap()
            .with_reader(reader)
            .without_geocoding()
    }

    #[test]
    fn sorted_by_timestamp() {
        let temp_dir = tempdir().unwrap();
        let late = touch(temp_dir.path(), "late.jpg");
        let early = touch(temp_dir.path(), "early.jpg");
        let reader = FakeReader(HashMap::from([
            (late.clone(), sample_tags("late.jpg", "2020:01:02 10:00:00")),
            (early.clone(), sample_tags("early.jpg", "2020:01:01 09:00:00")),
        ]));

        let batch = locator(None, reader).process(&ImagePaths::Many(vec![late, early]));

        let names: Vec<&str> = batch.locations.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["early.jpg", "late.jpg"]);
        assert!(batch.skipped.is_empty());
    }

    #[test]
    fn equal_timestamps_keep_input_order() {
        let temp_dir = tempdir().unwrap();
        let names = ["c.jpg", "a.jpg", "b.jpg", "first.jpg"];
        let mut reader = HashMap::new();
        let mut paths = Vec::new();
        for name in names {
            let path = touch(temp_dir.path(), name);
            let timestamp = if name == "first.jpg" {
                "2019:12:31 23:59:59"
            } else {
                "2020:05:05 05:05:05"
            };
            reader.insert(path.clone(), sample_tags(name, timestamp));
            paths.push(path);
        }

        let batch = locator(None, FakeReader(reader)).process(&ImagePaths::Many(paths));

        let names: Vec<&str> = batch.locations.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["first.jpg", "c.jpg", "a.jpg", "b.jpg"]);
    }

    #[test]
    fn images_without_gps_are_skipped() {
        let temp_dir = tempdir().unwrap();
        let mut reader = HashMap::new();
        let mut paths = Vec::new();
        for idx in 0..5 {
            let name = format!("{idx}.jpg");
            let path = touch(temp_dir.path(), &name);
            if idx % 2 == 0 {
                reader.insert(path.clone(), sample_tags(&name, "2020:01:01 00:00:00"));
            }
            paths.push(path);
        }
        paths.push(temp_dir.path().join("missing.jpg"));

        let batch = locator(None, FakeReader(reader)).process(&ImagePaths::Many(paths));

        assert_eq!(batch.locations.len(), 3);
        assert_eq!(batch.skipped.len(), 3);
        let not_found = batch
            .skipped
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::NotFound))
            .count();
        assert_eq!(not_found, 1);
    }

    #[test]
    fn nothing_to_process() {
        let batch = locator(None, FakeReader(HashMap::new())).process(&ImagePaths::Many(vec![]));

        assert!(batch.locations.is_empty());
        assert!(batch.skipped.is_empty());
    }

    #[test]
    fn enrichment_failure_keeps_record() {
        let temp_dir = tempdir().unwrap();
        let north = touch(temp_dir.path(), "north.jpg");
        let south = touch(temp_dir.path(), "south.jpg");
        let mut south_tags = sample_tags("south.jpg", "2020:01:02 00:00:00");
        south_tags.insert("GPSLatitudeRef", TagValue::Text("S".to_string()));
        let reader = FakeReader(HashMap::from([
            (north.clone(), sample_tags("north.jpg", "2020:01:01 00:00:00")),
            (south.clone(), south_tags),
        ]));

        let batch = locator(None, reader)
            .with_geocoder(FakeGeocoder)
            .process(&ImagePaths::Many(vec![north, south]));

        assert_eq!(batch.locations.len(), 2);
        assert_eq!(batch.geocode_failures, 1);
        assert_eq!(
            batch.locations[0].address_components.get("country"),
            Some("Somewhere")
        );
        assert!(batch.locations[1].address_components.is_empty());
    }

    #[test]
    fn http_client_is_built_on_first_lookup() {
        let locator = Locator::new("key", None, DEFAULT_ZOOM, DEFAULT_SIZE).unwrap();
        let Geocoding::Google(cell) = &locator.geocoding else {
            panic!("expected google geocoding by default");
        };
        assert!(cell.get().is_none());

        let locator = locator.without_geocoding();
        assert!(matches!(locator.geocoding, Geocoding::Off));
        let batch = locator.process(&ImagePaths::Many(vec![]));
        assert_eq!(batch.geocode_failures, 0);
    }

    #[test]
    fn init_without_paths() {
        let locator = locator(None, FakeReader(HashMap::new()));

        assert_eq!(locator.init(false), Output::Empty);
        assert_eq!(locator.init(true), Output::Empty);
    }

    #[test]
    fn init_single_image() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("sample.tif");
        write_sample_tiff(&path, "2021:06:01 12:00:00");
        let locator = Locator::new("key", Some(path.clone().into()), 10, "600x600")
            .unwrap()
            .without_geocoding();

        let Output::Locations(locations) = locator.init(false) else {
            panic!("expected locations");
        };
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].latitude, 10.5);
        assert_eq!(locations[0].longitude, 20.25);
    }

    #[test]
    fn init_mapping() {
        let temp_dir = tempdir().unwrap();
        let first = temp_dir.path().join("first.tif");
        let second = temp_dir.path().join("second.tif");
        write_sample_tiff(&first, "2021:06:01 12:00:00");
        write_sample_tiff(&second, "2021:06:02 12:00:00");
        let locator = Locator::new("key", Some(vec![second, first].into()), 7, "320x240")
            .unwrap()
            .without_geocoding();

        let Output::MapUrl(url) = locator.init(true) else {
            panic!("expected a map url");
        };
        assert!(url.starts_with(
            "https://maps.googleapis.com/maps/api/staticmap?key=key&center=10.5,20.25&zoom=7&size=320x240&maptype=roadmap"
        ));
        assert!(url.contains("%7Clabel:1%7C10.5,20.25"));
        assert!(url.contains("%7Clabel:2%7C10.5,20.25"));
    }

    #[test]
    fn invalid_options() {
        assert!(matches!(
            Locator::new("key", None, 0, "600x600"),
            Err(ConfigError::InvalidZoom(0))
        ));
        assert!(matches!(
            Locator::new("key", None, 10, "big"),
            Err(ConfigError::InvalidSize(_))
        ));
    }

    #[test]
    fn expand_directories() {
        let temp_dir = tempdir().unwrap();
        let nested = temp_dir.path().join("trip").join("day1");
        fs::create_dir_all(&nested).unwrap();
        let a = touch(&nested, "a.JPG");
        let b = touch(temp_dir.path(), "b.tif");
        touch(temp_dir.path(), "notes.txt");
        let loose = PathBuf::from("loose.jpg");

        let paths = expand_paths(&[temp_dir.path().to_path_buf(), loose.clone()]).unwrap();

        let mut expected = vec![a, b];
        expected.sort();
        expected.push(loose);
        assert_eq!(paths, expected);
    }
}
