//! Upstream search records, normalized at the ingestion boundary.
//!
//! CKAN package JSON is loosely shaped: optional fields come and go,
//! resources carry their service URL under either `wms_url` or `url`,
//! and extras are a key/value list. Everything is converted into the
//! strongly typed [`RawCatalogRecord`] here so the tree builder never
//! sees `null`s or missing keys.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::node::ItemKind;

/// Why a single upstream record or field could not be used.
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    Shape(String),

    #[error("record has neither a title nor a name")]
    MissingTitle,

    #[error("coverage must have four comma-separated parts, got {0}")]
    CoveragePartCount(usize),

    #[error("coverage part is not a number: {0:?}")]
    CoverageNumber(String),
}

/// One search result from the repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCatalogRecord {
    pub title: String,
    pub notes: Option<String>,
    pub license_url: Option<String>,
    /// `west,south,east,north` in degrees, as published by the repository.
    pub geo_coverage: Option<String>,
    /// Display names of the groups this record belongs to.
    pub groups: Vec<String>,
    pub organization: Option<Organization>,
    pub resources: Vec<Resource>,
    /// Extras in upstream order; duplicates are allowed here.
    pub extras: Vec<(String, String)>,
    /// Fields and list elements dropped because they had the wrong shape.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedField>,
}

/// A field or list element left out of a record during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedField {
    /// Path within the record, e.g. `notes` or `resources[1]`.
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// A distribution attached to a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Free-text format tag, e.g. `WMS` or `Esri REST`.
    pub format: String,
    pub url: Option<String>,
}

impl Resource {
    pub fn new(format: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            url: Some(url.into()),
        }
    }

    /// Exact, case-insensitive format match. `WMS 1.3.0` is not a WMS resource.
    pub fn service_kind(&self) -> Option<ItemKind> {
        let format = self.format.trim();
        if format.eq_ignore_ascii_case("wms") {
            Some(ItemKind::Wms)
        } else if format.eq_ignore_ascii_case("esri rest") {
            Some(ItemKind::EsriMapServer)
        } else {
            None
        }
    }

    pub fn is_wms(&self) -> bool {
        self.service_kind() == Some(ItemKind::Wms)
    }
}

/// Geographic extent in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Rectangle {
    /// Parse a `west,south,east,north` coverage string.
    pub fn from_coverage(coverage: &str) -> Result<Self, RecordError> {
        let parts: Vec<&str> = coverage.split(',').collect();
        if parts.len() != 4 {
            return Err(RecordError::CoveragePartCount(parts.len()));
        }

        let mut degrees = [0f64; 4];
        for (slot, part) in degrees.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse::<f64>()
                .map_err(|_| RecordError::CoverageNumber(part.trim().to_string()))?;
        }

        Ok(Self {
            west: degrees[0],
            south: degrees[1],
            east: degrees[2],
            north: degrees[3],
        })
    }
}

impl RawCatalogRecord {
    /// Normalize one element of `result.results`.
    ///
    /// Only a non-object value or a missing title rejects the record. A
    /// field or list element of the wrong type is dropped and listed in
    /// [`skipped`](Self::skipped); the rest of the record is kept.
    pub fn from_json(value: &Value) -> Result<Self, RecordError> {
        if !value.is_object() {
            return Err(RecordError::Shape(format!("expected an object, got {}", kind(value))));
        }
        let wire: WireRecord =
            serde_json::from_value(value.clone()).map_err(|e| RecordError::Shape(e.to_string()))?;
        wire.normalize()
    }

    /// Extras as a map; later duplicate keys overwrite earlier ones.
    pub fn extras_map(&self) -> BTreeMap<String, String> {
        self.extras.iter().cloned().collect()
    }

    /// The organization's description, else its title.
    pub fn organization_custodian(&self) -> Option<&str> {
        let org = self.organization.as_ref()?;
        non_empty(org.description.as_deref()).or_else(|| non_empty(org.title.as_deref()))
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

fn non_empty_owned(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

// ── Wire format ───────────────────────────────────────────

/// A value of the expected type, or whatever was there instead.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Valid(T),
    Invalid(Value),
}

#[derive(Deserialize)]
struct WireRecord {
    title: Option<Lenient<String>>,
    name: Option<Lenient<String>>,
    notes: Option<Lenient<String>>,
    license_url: Option<Lenient<String>>,
    geo_coverage: Option<Lenient<String>>,
    groups: Option<Lenient<Vec<Value>>>,
    organization: Option<Lenient<WireOrganization>>,
    resources: Option<Lenient<Vec<Value>>>,
    extras: Option<Lenient<Vec<Value>>>,
}

#[derive(Deserialize)]
struct WireGroup {
    display_name: Option<Lenient<String>>,
    title: Option<Lenient<String>>,
    name: Option<Lenient<String>>,
}

#[derive(Deserialize)]
struct WireOrganization {
    title: Option<Lenient<String>>,
    description: Option<Lenient<String>>,
}

#[derive(Deserialize)]
struct WireResource {
    format: Option<Lenient<String>>,
    wms_url: Option<Lenient<String>>,
    url: Option<Lenient<String>>,
}

#[derive(Deserialize)]
struct WireExtra {
    key: Option<Lenient<String>>,
    value: Option<Value>,
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Collects the fields dropped while one record is normalized.
#[derive(Default)]
struct Normalizer {
    skipped: Vec<SkippedField>,
}

impl Normalizer {
    fn skip(&mut self, field: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedField {
            field: field.into(),
            reason: reason.into(),
        });
    }

    fn text(&mut self, field: &str, value: Option<Lenient<String>>) -> Option<String> {
        match value? {
            Lenient::Valid(text) => Some(text),
            Lenient::Invalid(other) => {
                self.skip(field, format!("expected a string, got {}", kind(&other)));
                None
            }
        }
    }

    fn list(&mut self, field: &str, value: Option<Lenient<Vec<Value>>>) -> Vec<Value> {
        match value {
            None => Vec::new(),
            Some(Lenient::Valid(items)) => items,
            Some(Lenient::Invalid(other)) => {
                self.skip(field, format!("expected a list, got {}", kind(&other)));
                Vec::new()
            }
        }
    }

    /// Decode each element of a list field, dropping those that are not objects.
    fn elements<T: DeserializeOwned>(&mut self, field: &str, items: Vec<Value>) -> Vec<(String, T)> {
        let mut decoded = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let path = format!("{field}[{index}]");
            if !item.is_object() {
                self.skip(path, format!("expected an object, got {}", kind(&item)));
                continue;
            }
            match serde_json::from_value(item) {
                Ok(element) => decoded.push((path, element)),
                Err(e) => self.skip(path, e.to_string()),
            }
        }
        decoded
    }
}

impl WireRecord {
    fn normalize(self) -> Result<RawCatalogRecord, RecordError> {
        let mut n = Normalizer::default();

        let title = non_empty_owned(n.text("title", self.title))
            .or_else(|| non_empty_owned(n.text("name", self.name)))
            .ok_or(RecordError::MissingTitle)?;

        let extra_items = n.list("extras", self.extras);
        let mut extras = Vec::new();
        for (path, extra) in n.elements::<WireExtra>("extras", extra_items) {
            let Some(key) = n.text(&format!("{path}.key"), extra.key) else {
                continue;
            };
            let value = match extra.value {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
            };
            extras.push((key, value));
        }

        let geo_coverage = non_empty_owned(n.text("geo_coverage", self.geo_coverage)).or_else(|| {
            extras
                .iter()
                .rev()
                .find(|(k, _)| k == "geo_coverage")
                .map(|(_, v)| v.clone())
        });

        let group_items = n.list("groups", self.groups);
        let mut groups = Vec::new();
        for (path, group) in n.elements::<WireGroup>("groups", group_items) {
            let display_name = n.text(&format!("{path}.display_name"), group.display_name);
            let group_title = n.text(&format!("{path}.title"), group.title);
            let group_name = n.text(&format!("{path}.name"), group.name);
            if let Some(name) = non_empty_owned(display_name)
                .or_else(|| non_empty_owned(group_title))
                .or_else(|| non_empty_owned(group_name))
            {
                groups.push(name);
            }
        }

        let resource_items = n.list("resources", self.resources);
        let mut resources = Vec::new();
        for (path, resource) in n.elements::<WireResource>("resources", resource_items) {
            let format = n.text(&format!("{path}.format"), resource.format);
            let wms_url = n.text(&format!("{path}.wms_url"), resource.wms_url);
            let url = n.text(&format!("{path}.url"), resource.url);
            resources.push(Resource {
                format: format.unwrap_or_default(),
                url: non_empty_owned(wms_url).or_else(|| non_empty_owned(url)),
            });
        }

        let organization = match self.organization {
            None => None,
            Some(Lenient::Valid(org)) => Some(Organization {
                title: n.text("organization.title", org.title),
                description: n.text("organization.description", org.description),
            }),
            Some(Lenient::Invalid(other)) => {
                n.skip("organization", format!("expected an object, got {}", kind(&other)));
                None
            }
        };

        let notes = n.text("notes", self.notes);
        let license_url = non_empty_owned(n.text("license_url", self.license_url));

        Ok(RawCatalogRecord {
            title,
            notes,
            license_url,
            geo_coverage,
            groups,
            organization,
            resources,
            extras,
            skipped: n.skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_full_record() {
        let value = json!({
            "title": "Rainfall",
            "notes": "Monthly rainfall\nAll stations",
            "license_url": "http://license.example/cc-by",
            "groups": [{"display_name": "Climate"}, {"title": "Weather"}],
            "organization": {"title": "Bureau", "description": ""},
            "resources": [
                {"format": "WMS", "wms_url": "http://s/wms?LAYERS=rain", "url": "http://s/other"},
                {"format": "CSV", "url": "http://s/rain.csv"},
                {"format": "Esri REST", "url": ""}
            ],
            "extras": [
                {"key": "data_url", "value": "http://s/old"},
                {"key": "geo_coverage", "value": "110,-45,155,-10"},
                {"key": "data_url", "value": "http://s/new"},
                {"key": "count", "value": 3}
            ]
        });

        let record = RawCatalogRecord::from_json(&value).unwrap();
        assert_eq!(record.title, "Rainfall");
        assert_eq!(record.groups, vec!["Climate", "Weather"]);
        assert_eq!(record.resources[0].url.as_deref(), Some("http://s/wms?LAYERS=rain"));
        assert_eq!(record.resources[1].url.as_deref(), Some("http://s/rain.csv"));
        assert_eq!(record.resources[2].url, None);
        assert_eq!(record.geo_coverage.as_deref(), Some("110,-45,155,-10"));
        assert_eq!(record.organization_custodian(), Some("Bureau"));

        let extras = record.extras_map();
        assert_eq!(extras.get("data_url").map(String::as_str), Some("http://s/new"));
        assert_eq!(extras.get("count").map(String::as_str), Some("3"));
    }

    #[test]
    fn null_fields_are_tolerated() {
        let value = json!({
            "title": null,
            "name": "rainfall-dataset",
            "notes": null,
            "groups": null,
            "resources": null,
            "extras": null
        });
        let record = RawCatalogRecord::from_json(&value).unwrap();
        assert_eq!(record.title, "rainfall-dataset");
        assert!(record.resources.is_empty());
        assert!(record.groups.is_empty());
    }

    #[test]
    fn record_without_title_is_rejected() {
        assert_eq!(
            RawCatalogRecord::from_json(&json!({"notes": "x"})),
            Err(RecordError::MissingTitle)
        );
        assert!(matches!(
            RawCatalogRecord::from_json(&json!("just a string")),
            Err(RecordError::Shape(_))
        ));
    }

    #[test]
    fn bad_resource_is_dropped_and_the_rest_kept() {
        let value = json!({
            "title": "Rainfall",
            "groups": [{"display_name": "Climate"}],
            "resources": [
                {"format": "WMS", "url": "http://s/wms?LAYERS=rain"},
                {"format": "CSV", "url": 42},
                "not a resource"
            ]
        });

        let record = RawCatalogRecord::from_json(&value).unwrap();
        assert_eq!(record.resources.len(), 2);
        assert!(record.resources[0].is_wms());
        assert_eq!(record.resources[1].format, "CSV");
        assert_eq!(record.resources[1].url, None);

        let fields: Vec<&str> = record.skipped.iter().map(|s| s.field.as_str()).collect();
        assert_eq!(fields, vec!["resources[1].url", "resources[2]"]);
    }

    #[test]
    fn wrongly_typed_scalars_become_absent() {
        let value = json!({
            "title": "Rainfall",
            "notes": 7,
            "license_url": true,
            "geo_coverage": [110, -45, 155, -10],
            "organization": "Bureau",
            "groups": [{"display_name": 3, "title": "Climate"}, 5],
            "resources": [{"format": "WMS", "url": "http://s/wms?LAYERS=rain"}],
            "extras": [{"key": 1, "value": "x"}, {"key": "data_url", "value": "http://s/d"}]
        });

        let record = RawCatalogRecord::from_json(&value).unwrap();
        assert_eq!(record.notes, None);
        assert_eq!(record.license_url, None);
        assert_eq!(record.geo_coverage, None);
        assert_eq!(record.organization, None);
        assert_eq!(record.groups, vec!["Climate"]);
        assert_eq!(record.resources.len(), 1);
        assert_eq!(record.extras, vec![("data_url".to_string(), "http://s/d".to_string())]);

        let notes = record.skipped.iter().find(|s| s.field == "notes").unwrap();
        assert_eq!(notes.reason, "expected a string, got a number");
        assert_eq!(record.skipped.len(), 7);
    }

    #[test]
    fn non_list_collections_are_skipped() {
        let value = json!({"title": "Rainfall", "resources": {"format": "WMS"}, "groups": "Climate"});
        let record = RawCatalogRecord::from_json(&value).unwrap();
        assert!(record.resources.is_empty());
        assert!(record.groups.is_empty());
        assert_eq!(record.skipped.len(), 2);
    }

    #[test]
    fn format_matching_is_exact_and_case_insensitive() {
        assert_eq!(Resource::new("wms", "u").service_kind(), Some(ItemKind::Wms));
        assert_eq!(Resource::new("WMS", "u").service_kind(), Some(ItemKind::Wms));
        assert_eq!(
            Resource::new("ESRI REST", "u").service_kind(),
            Some(ItemKind::EsriMapServer)
        );
        assert_eq!(Resource::new("WMS 1.3.0", "u").service_kind(), None);
        assert_eq!(Resource::new("esri-rest", "u").service_kind(), None);
    }

    #[test]
    fn coverage_parsing() {
        let rect = Rectangle::from_coverage("110.5, -45, 155,-10").unwrap();
        assert_eq!(rect.west, 110.5);
        assert_eq!(rect.south, -45.0);
        assert_eq!(rect.east, 155.0);
        assert_eq!(rect.north, -10.0);

        assert_eq!(
            Rectangle::from_coverage("1,2,3"),
            Err(RecordError::CoveragePartCount(3))
        );
        assert_eq!(
            Rectangle::from_coverage("1,2,3,north"),
            Err(RecordError::CoverageNumber("north".to_string()))
        );
    }

    #[test]
    fn custodian_prefers_description() {
        let record = RawCatalogRecord {
            organization: Some(Organization {
                title: Some("Bureau".into()),
                description: Some("Bureau of Meteorology".into()),
            }),
            ..Default::default()
        };
        assert_eq!(record.organization_custodian(), Some("Bureau of Meteorology"));
        assert_eq!(RawCatalogRecord::default().organization_custodian(), None);
    }
}
