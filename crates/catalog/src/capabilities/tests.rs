use std::collections::BTreeSet;

use mapcat_core::{RawCatalogRecord, Resource};

use super::*;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::fetch::mock::MockFetcher;
use crate::proxy::{CorsProxy, NoProxy};

const CAPABILITIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<WMS_Capabilities version="1.3.0" xmlns="http://www.opengis.net/wms" xmlns:xlink="http://www.w3.org/1999/xlink">
  <Service>
    <Name>WMS</Name>
    <Title>Test server</Title>
  </Service>
  <Capability>
    <Request>
      <GetCapabilities><Format>text/xml</Format></GetCapabilities>
    </Request>
    <Exception><Format>XML</Format></Exception>
    <Layer>
      <Title>Root</Title>
      <CRS>EPSG:4326</CRS>
      <Layer queryable="1">
        <Name>rain</Name>
        <Title>Rain</Title>
        <Style><Name>default</Name><Title>Default</Title></Style>
        <MaxScaleDenominator>1000</MaxScaleDenominator>
      </Layer>
      <Layer>
        <Name>wind</Name>
        <Title>Wind</Title>
        <Layer>
          <Name>gusts</Name>
          <MaxScaleDenominator>2000</MaxScaleDenominator>
        </Layer>
      </Layer>
    </Layer>
  </Capability>
</WMS_Capabilities>"#;

const SINGLE_LAYER: &str = r#"<WMS_Capabilities>
  <Capability>
    <Layer><Name>solo</Name></Layer>
  </Capability>
</WMS_Capabilities>"#;

const EXCEPTION: &str = r#"<ServiceExceptionReport>
  <ServiceException>Service unavailable</ServiceException>
</ServiceExceptionReport>"#;

const CAPS_URL: &str = "http://s/wms?service=WMS&request=GetCapabilities";

fn candidates(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn wms_record(title: &str, urls: &[&str]) -> RawCatalogRecord {
    RawCatalogRecord {
        title: title.to_string(),
        resources: urls.iter().map(|u| Resource::new("WMS", *u)).collect(),
        ..Default::default()
    }
}

// ── Document parsing ────────────────────────────────────────────

#[test]
fn parses_nested_layers_pre_order() {
    let doc = CapabilitiesDocument::parse(CAPABILITIES).unwrap();
    assert_eq!(doc.layers.len(), 1);

    let names: Vec<Option<&str>> = doc.walk().map(|l| l.name.as_deref()).collect();
    assert_eq!(names, vec![None, Some("rain"), Some("wind"), Some("gusts")]);

    let rain = doc.walk().find(|l| l.name.as_deref() == Some("rain")).unwrap();
    assert_eq!(rain.max_scale_denominator, Some(1000.0));
    let wind = doc.walk().find(|l| l.name.as_deref() == Some("wind")).unwrap();
    assert_eq!(wind.max_scale_denominator, None);
}

#[test]
fn single_layer_is_normalized_to_list() {
    let doc = CapabilitiesDocument::parse(SINGLE_LAYER).unwrap();
    assert_eq!(doc.layers, vec![CapabilityLayer::named("solo")]);
}

#[test]
fn document_without_capability_is_rejected() {
    assert!(matches!(
        CapabilitiesDocument::parse(EXCEPTION),
        Err(CapabilityError::MissingCapability)
    ));
}

#[test]
fn unparseable_scale_is_treated_as_absent() {
    let xml = r#"<WMS_Capabilities><Capability><Layer>
        <Name>odd</Name><MaxScaleDenominator>huge</MaxScaleDenominator>
    </Layer></Capability></WMS_Capabilities>"#;
    let doc = CapabilitiesDocument::parse(xml).unwrap();
    assert_eq!(doc.layers[0].max_scale_denominator, None);
}

// ── Filter ──────────────────────────────────────────────────────

#[test]
fn filter_marks_present_layers() {
    let doc = CapabilitiesDocument::parse(CAPABILITIES).unwrap();
    let mut diagnostics = Diagnostics::new();
    let decisions = filter_layers(
        "http://s/wms",
        &doc,
        &candidates(&["rain", "gusts", "missing"]),
        None,
        &mut diagnostics,
    );

    assert_eq!(decisions["rain"], Decision::Included);
    assert_eq!(decisions["gusts"], Decision::Included);
    assert_eq!(decisions["missing"], Decision::Excluded);
    assert!(diagnostics.is_empty());
}

#[test]
fn scale_threshold_is_inclusive() {
    let doc = CapabilitiesDocument {
        layers: vec![
            CapabilityLayer {
                name: Some("below".into()),
                max_scale_denominator: Some(1999.0),
                layers: vec![],
            },
            CapabilityLayer {
                name: Some("at".into()),
                max_scale_denominator: Some(2000.0),
                layers: vec![],
            },
            CapabilityLayer::named("unbounded"),
        ],
    };
    let mut diagnostics = Diagnostics::new();
    let decisions = filter_layers(
        "http://s/wms",
        &doc,
        &candidates(&["below", "at", "unbounded"]),
        Some(2000.0),
        &mut diagnostics,
    );

    assert_eq!(decisions["below"], Decision::Excluded);
    assert_eq!(decisions["at"], Decision::Included);
    assert_eq!(decisions["unbounded"], Decision::Included);
    assert_eq!(
        diagnostics.events(),
        &[DiagnosticEvent::ScaleExcluded {
            endpoint: "http://s/wms".into(),
            layer: "below".into(),
            max_scale_denominator: 1999.0,
            threshold: 2000.0,
        }]
    );
}

#[test]
fn earlier_inclusion_survives_later_scale_failure() {
    let doc = CapabilitiesDocument {
        layers: vec![
            CapabilityLayer::named("dup"),
            CapabilityLayer {
                name: Some("dup".into()),
                max_scale_denominator: Some(10.0),
                layers: vec![],
            },
        ],
    };
    let mut diagnostics = Diagnostics::new();
    let decisions = filter_layers("e", &doc, &candidates(&["dup"]), Some(100.0), &mut diagnostics);
    assert_eq!(decisions["dup"], Decision::Included);
    assert_eq!(diagnostics.events().len(), 1);
}

// ── Coordinator ─────────────────────────────────────────────────

#[test]
fn groups_only_wms_resources_with_urls() {
    let mut record = wms_record("A", &["http://s/wms?LAYERS=rain", "http://t/wms?layers=x"]);
    record.resources.push(Resource::new("Esri REST", "http://arc/MapServer"));
    record.resources.push(Resource {
        format: "wms".into(),
        url: None,
    });

    let servers = group_wms_layers(&[record, wms_record("B", &["http://s/wms?LAYERS=wind"])]);
    assert_eq!(servers.len(), 2);
    assert_eq!(servers["http://s/wms"], candidates(&["rain", "wind"]));
    assert_eq!(servers["http://t/wms"], candidates(&["x"]));
}

#[tokio::test]
async fn same_server_layer_gets_one_decision() {
    let records = vec![
        wms_record("Rainfall", &["http://s/wms?LAYERS=rain&x=1"]),
        wms_record("Rainfall (copy)", &["http://s/wms?layers=rain"]),
        wms_record("Snow", &["http://s/wms?LAYERS=snow"]),
    ];
    let fetcher = MockFetcher::new().respond(CAPS_URL, CAPABILITIES);

    let outcome = validate_layers(&records, None, &fetcher, &NoProxy, None).await;

    assert_eq!(outcome.endpoints, 1);
    assert_eq!(fetcher.requests(), vec![CAPS_URL.to_string()]);
    let rain = ServerLayerKey::from_url("http://s/wms?LAYERS=rain&x=1");
    assert_eq!(rain, ServerLayerKey::from_url("http://s/wms?layers=rain"));
    assert_eq!(outcome.decisions.get(&rain), Some(Decision::Included));
    assert!(outcome
        .decisions
        .is_excluded(&ServerLayerKey::new("http://s/wms", "snow")));
}

#[tokio::test]
async fn failed_endpoint_excludes_only_its_layers() {
    let records = vec![
        wms_record("Rainfall", &["http://s/wms?LAYERS=rain"]),
        wms_record("Broken", &["http://down/wms?LAYERS=a"]),
        wms_record("Odd", &["http://odd/wms?LAYERS=b"]),
    ];
    let fetcher = MockFetcher::new()
        .respond(CAPS_URL, CAPABILITIES)
        .fail("http://down/wms?service=WMS&request=GetCapabilities", 503)
        .respond("http://odd/wms?service=WMS&request=GetCapabilities", EXCEPTION);

    let outcome = validate_layers(&records, None, &fetcher, &NoProxy, None).await;

    assert_eq!(outcome.endpoints, 3);
    assert!(!outcome.decisions.is_excluded(&ServerLayerKey::new("http://s/wms", "rain")));
    assert!(outcome.decisions.is_excluded(&ServerLayerKey::new("http://down/wms", "a")));
    assert!(outcome.decisions.is_excluded(&ServerLayerKey::new("http://odd/wms", "b")));

    let unavailable: Vec<&str> = outcome
        .diagnostics
        .events()
        .iter()
        .filter_map(|e| match e {
            DiagnosticEvent::CapabilityUnavailable { endpoint, .. } => Some(endpoint.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(unavailable, vec!["http://down/wms", "http://odd/wms"]);
}

#[tokio::test]
async fn capability_requests_go_through_proxy() {
    let records = vec![wms_record("Rainfall", &["http://s/wms?LAYERS=rain"])];
    let proxied = format!("https://maps.example.org/proxy/_1d/{CAPS_URL}");
    let fetcher = MockFetcher::new().respond(&proxied, CAPABILITIES);
    let proxy = CorsProxy::new("https://maps.example.org/proxy", vec![]);

    let outcome = validate_layers(&records, None, &fetcher, &proxy, Some("1d")).await;

    assert_eq!(fetcher.requests(), vec![proxied]);
    assert_eq!(outcome.decisions.included_count(), 1);
}

#[tokio::test]
async fn no_wms_resources_means_no_fetches() {
    let record = RawCatalogRecord {
        title: "Esri only".into(),
        resources: vec![Resource::new("Esri REST", "http://arc/MapServer")],
        ..Default::default()
    };
    let fetcher = MockFetcher::new();
    let outcome = validate_layers(&[record], Some(10.0), &fetcher, &NoProxy, None).await;
    assert!(outcome.decisions.is_empty());
    assert!(fetcher.requests().is_empty());
}
