use geo::{Centroid, MultiPoint, Point};
use log::warn;
use rand::Rng;

use crate::{error::ConfigError, photo_metadata::LocationRecord};

const STATIC_MAP_URL: &str = "https://maps.googleapis.com/maps/api/staticmap";
const MAP_TYPE: &str = "roadmap";

pub const DEFAULT_ZOOM: u32 = 10;
pub const DEFAULT_SIZE: &str = "600x600";

/// Zoom level and pixel size of the rendered map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingOptions {
    zoom: u32,
    size: String,
}

impl MappingOptions {
    pub fn new(zoom: u32, size: &str) -> Result<MappingOptions, ConfigError> {
        if zoom == 0 {
            return Err(ConfigError::InvalidZoom(zoom));
        }
        if !is_valid_size(size) {
            return Err(ConfigError::InvalidSize(size.to_string()));
        }
        Ok(MappingOptions {
            zoom,
            size: size.to_string(),
        })
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    pub fn size(&self) -> &str {
        &self.size
    }
}

impl Default for MappingOptions {
    fn default() -> Self {
        MappingOptions {
            zoom: DEFAULT_ZOOM,
            size: DEFAULT_SIZE.to_string(),
        }
    }
}

fn is_valid_size(size: &str) -> bool {
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match size.split_once('x') {
        Some((width, height)) => digits(width) && digits(height),
        None => false,
    }
}

/// Mean of all coordinates, as a point with x = longitude and y = latitude.
/// `None` for an empty set.
pub fn center(locations: &[LocationRecord]) -> Option<Point> {
    let points: MultiPoint = locations
        .iter()
        .map(|location| Point::new(location.longitude, location.latitude))
        .collect();
    points.centroid()
}

/// A random 24-bit colour as six uppercase hex digits.
pub fn random_hex_color<R: Rng>(rng: &mut R) -> String {
    format!("{:06X}", rng.random_range(0..=0xFF_FFFFu32))
}

/// Static map URL with one numbered marker per location, in order.
///
/// An empty set has no centre; the URL then falls back to `0,0`.
pub fn build_url<R: Rng>(
    locations: &[LocationRecord],
    options: &MappingOptions,
    api_key: &str,
    rng: &mut R,
) -> String {
    let (lat, lon) = match center(locations) {
        Some(point) => (point.y(), point.x()),
        None => {
            warn!("No locations to map, centering on 0,0");
            (0.0, 0.0)
        }
    };

    let mut url = format!(
        "{}?key={}&center={},{}&zoom={}&size={}&maptype={}",
        STATIC_MAP_URL,
        api_key,
        lat,
        lon,
        options.zoom(),
        options.size(),
        MAP_TYPE
    );
    for (idx, location) in locations.iter().enumerate() {
        url.push_str(&format!(
            "&markers=color:0x{}%7Clabel:{}%7C{},{}",
            random_hex_color(rng),
            idx + 1,
            location.latitude,
            location.longitude
        ));
    }
    url
}

/// [`build_url`] with the thread-local random generator.
pub fn map_url(locations: &[LocationRecord], options: &MappingOptions, api_key: &str) -> String {
    build_url(locations, options, api_key, &mut rand::rng())
}
