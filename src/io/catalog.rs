//! G-Portal catalog search responses.
//!
//! The search endpoint returns a GeoJSON feature collection; each feature
//! carries a granule footprint and its product properties. Only parsing and
//! footprint selection live here, the HTTP exchange is left to the caller.

use crate::core::footprint::{select_index, Candidate, Footprint};
use crate::types::{SgliError, SgliResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Clone, Deserialize)]
struct Feature {
    geometry: Geometry,
    properties: Properties,
}

#[derive(Debug, Clone, Deserialize)]
struct Geometry {
    coordinates: Vec<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Properties {
    identifier: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    begin_position: Option<String>,
    #[serde(default)]
    end_position: Option<String>,
    #[serde(default)]
    product: Option<FileRef>,
    #[serde(default)]
    browse: Vec<FileRef>,
    #[serde(default)]
    gpp: Option<Gpp>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileRef {
    file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Gpp {
    #[serde(default)]
    cloud_cover_percentage: Option<Value>,
}

/// Product properties of one catalog hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub identifier: String,
    pub status: Option<String>,
    pub resolution: Option<String>,
    pub download_url: Option<String>,
    pub preview_url: Option<String>,
    pub cloud_cover: Option<f64>,
    pub begin_position: Option<String>,
    pub end_position: Option<String>,
}

impl CatalogRecord {
    pub fn acquisition_start(&self) -> Option<DateTime<Utc>> {
        parse_position(self.begin_position.as_deref()?)
    }

    pub fn acquisition_end(&self) -> Option<DateTime<Utc>> {
        parse_position(self.end_position.as_deref()?)
    }

    /// Granule file name, the last segment of the download URL
    pub fn file_name(&self) -> Option<&str> {
        self.download_url.as_deref()?.rsplit('/').next()
    }
}

fn parse_position(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Cloud cover arrives as a number, a numeric string or null
fn cloud_cover(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn into_candidate(feature: Feature) -> Candidate<CatalogRecord> {
    let ring = feature
        .geometry
        .coordinates
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter()
        .filter(|v| v.len() >= 2)
        .map(|v| (v[0], v[1]))
        .collect();

    let p = feature.properties;
    let record = CatalogRecord {
        identifier: p.identifier,
        status: p.status,
        resolution: p.resolution,
        download_url: p.product.and_then(|f| f.file_name),
        preview_url: p.browse.into_iter().find_map(|f| f.file_name),
        cloud_cover: cloud_cover(p.gpp.as_ref().and_then(|g| g.cloud_cover_percentage.as_ref())),
        begin_position: p.begin_position,
        end_position: p.end_position,
    };
    Candidate::new(Footprint::new(ring), record)
}

/// Parsed catalog search response
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub candidates: Vec<Candidate<CatalogRecord>>,
}

impl SearchResult {
    pub fn from_json_str(json: &str) -> SgliResult<Self> {
        let collection: FeatureCollection = serde_json::from_str(json)?;
        let candidates: Vec<_> = collection.features.into_iter().map(into_candidate).collect();
        log::debug!("Catalog response holds {} granules", candidates.len());
        Ok(Self { candidates })
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SgliResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &CatalogRecord> {
        self.candidates.iter().map(|c| &c.record)
    }

    /// Granule whose footprint covers (lat, lon) most centrally
    pub fn best_match(&self, lat: f64, lon: f64) -> Option<&CatalogRecord> {
        select_index(&self.candidates, lon, lat).map(|i| &self.candidates[i].record)
    }
}

/// 1 x 1 degree WKT query box centred on (lon, lat)
pub fn search_polygon_wkt(lon: f64, lat: f64) -> String {
    let (lon1, lon2) = (lon - 0.5, lon + 0.5);
    let (lat1, lat2) = (lat - 0.5, lat + 0.5);
    format!(
        "POLYGON(({lon2} {lat2}, {lon1} {lat2}, {lon1} {lat1}, {lon2} {lat1}, {lon2} {lat2}))",
        lon1 = lon1,
        lon2 = lon2,
        lat1 = lat1,
        lat2 = lat2
    )
}

/// Reject search windows that end before they start
pub fn validate_window(start: &str, end: &str) -> SgliResult<(DateTime<Utc>, DateTime<Utc>)> {
    let parse = |s: &str| {
        parse_position(s).ok_or_else(|| SgliError::InvalidInput(format!("not an RFC 3339 time: {}", s)))
    };
    let (start, end) = (parse(start)?, parse(end)?);
    if end < start {
        return Err(SgliError::InvalidInput(format!(
            "search window ends ({}) before it starts ({})",
            end, start
        )));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_ring_order() {
        assert_eq!(
            search_polygon_wkt(135.0, 35.0),
            "POLYGON((135.5 35.5, 134.5 35.5, 134.5 34.5, 135.5 34.5, 135.5 35.5))"
        );
    }

    #[test]
    fn test_cloud_cover_forms() {
        assert_eq!(cloud_cover(Some(&Value::from(12))), Some(12.0));
        assert_eq!(cloud_cover(Some(&Value::from("7.5"))), Some(7.5));
        assert_eq!(cloud_cover(Some(&Value::Null)), None);
        assert_eq!(cloud_cover(None), None);
    }

    #[test]
    fn test_window_validation() {
        assert!(validate_window("2023-01-01T00:00:00Z", "2023-01-02T00:00:00Z").is_ok());
        assert!(validate_window("2023-01-02T00:00:00Z", "2023-01-01T00:00:00Z").is_err());
        assert!(validate_window("yesterday", "2023-01-01T00:00:00Z").is_err());
    }
}
