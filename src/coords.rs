use crate::error::CoordError;

/// Parses one EXIF rational component, either "N/D" or a plain number.
///
/// A lone "/" is read as 0.
pub fn coord_to_f64(raw: &str) -> Result<f64, CoordError> {
    let raw = raw.trim();
    if raw.len() == 1 && raw.contains('/') {
        return Ok(0.0);
    }

    let mut parts = raw.split('/');
    let value = match (parts.next(), parts.next()) {
        (Some(num), Some(denom)) => parse_part(num, raw)? / parse_part(denom, raw)?,
        _ => parse_part(raw, raw)?,
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(CoordError::Malformed(raw.to_string()))
    }
}

/// Degrees, minutes and seconds to signed decimal degrees.
pub fn convert_coord(
    degrees: &str,
    minutes: &str,
    seconds: &str,
    hemisphere: &str,
) -> Result<f64, CoordError> {
    let decimal =
        coord_to_f64(degrees)? + coord_to_f64(minutes)? / 60.0 + coord_to_f64(seconds)? / 3600.0;
    // Also folds -0.0
    if decimal == 0.0 {
        return Ok(0.0);
    }
    match hemisphere.trim() {
        "S" | "W" => Ok(-decimal),
        _ => Ok(decimal),
    }
}

fn parse_part(part: &str, raw: &str) -> Result<f64, CoordError> {
    part.trim()
        .parse::<f64>()
        .map_err(|_| CoordError::Malformed(raw.to_string()))
}
