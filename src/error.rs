use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    #[error("malformed coordinate component {0:?}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("exif parsing error: {0}")]
    Exif(#[from] exif::Error),
}

/// Why an image contributed no location record.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("file does not exist")]
    NotFound,
    #[error("unreadable metadata: {0}")]
    Unreadable(#[from] MetadataError),
    #[error("no GPS data (missing {0})")]
    NoGps(&'static str),
    #[error(transparent)]
    MalformedCoordinate(#[from] CoordError),
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocode request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocode response is not valid json: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("geocode response has no usable result")]
    NoResult,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("zoom must be a positive integer, got {0}")]
    InvalidZoom(u32),
    #[error("size must look like WIDTHxHEIGHT, got {0:?}")]
    InvalidSize(String),
    #[error("cannot build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
