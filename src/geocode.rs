use std::time::Duration;

use reqwest::blocking::{Client, Request};
use serde::{de::IgnoredAny, ser::SerializeMap, Deserialize, Serialize, Serializer};

use crate::error::{ConfigError, GeocodeError};

const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Address parts keyed by component type, e.g. "country" → "France".
///
/// Keeps insertion order; inserting an existing type replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressComponents(Vec<(String, String)>);

impl AddressComponents {
    pub fn insert(&mut self, kind: &str, long_name: &str) {
        match self.0.iter_mut().find(|(k, _)| k == kind) {
            Some((_, value)) => *value = long_name.to_string(),
            None => self.0.push((kind.to_string(), long_name.to_string())),
        }
    }

    pub fn get(&self, kind: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for AddressComponents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (kind, long_name) in &self.0 {
            map.serialize_entry(kind, long_name)?;
        }
        map.end()
    }
}

/// Turns a coordinate into address components.
pub trait ReverseGeocoder {
    fn lookup(&self, latitude: f64, longitude: f64) -> Result<AddressComponents, GeocodeError>;
}

/// Google Geocoding API client. Every request gets its own connect timeout.
pub struct GoogleGeocoder {
    client: Client,
    api_key: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: &str) -> Result<GoogleGeocoder, ConfigError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(GoogleGeocoder {
            client,
            api_key: api_key.to_string(),
        })
    }

    fn build_request(&self, latitude: f64, longitude: f64) -> Result<Request, GeocodeError> {
        let latlng = format!("{},{}", latitude, longitude);
        let mut params = vec![("latlng", latlng.as_str()), ("sensor", "false")];
        if !self.api_key.is_empty() {
            params.push(("key", self.api_key.as_str()));
        }
        Ok(self.client.get(GEOCODE_URL).query(&params).build()?)
    }

    fn request_api(&self, latitude: f64, longitude: f64) -> Result<String, GeocodeError> {
        let request = self.build_request(latitude, longitude)?;
        let res = self.client.execute(request)?.error_for_status()?;
        Ok(res.text()?)
    }
}

impl ReverseGeocoder for GoogleGeocoder {
    fn lookup(&self, latitude: f64, longitude: f64) -> Result<AddressComponents, GeocodeError> {
        let body = self.request_api(latitude, longitude)?;
        json_to_components(&body)
    }
}

/// Either the expected shape or anything else, which is ignored.
#[derive(Deserialize)]
#[serde(untagged)]
enum Shaped<T> {
    Expected(T),
    Other(IgnoredAny),
}

impl<T> Default for Shaped<T> {
    fn default() -> Self {
        Shaped::Other(IgnoredAny)
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Shaped<Vec<Shaped<GeocodeResult>>>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    address_components: Shaped<Vec<Shaped<AddressComponent>>>,
}

#[derive(Deserialize)]
struct AddressComponent {
    types: Vec<String>,
    long_name: String,
}

/// First type of a component, unless that is the generic "political", in
/// which case the last one.
fn component_kind(types: &[String]) -> Option<&str> {
    match types.first().map(String::as_str) {
        Some("political") => types.last().map(String::as_str),
        first => first,
    }
}

fn json_to_components(body: &str) -> Result<AddressComponents, GeocodeError> {
    let response: GeocodeResponse = serde_json::from_str(body)?;
    let Shaped::Expected(results) = response.results else {
        return Err(GeocodeError::NoResult);
    };
    let Some(Shaped::Expected(first)) = results.into_iter().next() else {
        return Err(GeocodeError::NoResult);
    };
    let components = match first.address_components {
        Shaped::Expected(components) if !components.is_empty() => components,
        _ => return Err(GeocodeError::NoResult),
    };

    let mut address = AddressComponents::default();
    for component in components {
        if let Shaped::Expected(component) = component {
            if let Some(kind) = component_kind(&component.types) {
                address.insert(kind, &component.long_name);
            }
        }
    }
    Ok(address)
}
