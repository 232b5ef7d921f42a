use std::sync::Arc;

use mapcat_core::{
    CatalogGroup, CatalogItem, CatalogNode, ItemFields, ItemKind, RawCatalogRecord, Rectangle,
    SearchConfiguration,
};
use serde::Serialize;
use tracing::info;

use crate::capabilities::FilterDecisions;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::endpoint::{layer_name, strip_query, ServerLayerKey};

/// What one build added to the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub records_used: usize,
    pub items_created: usize,
    pub groups_created: usize,
}

/// Populates a caller-owned root group from search records.
pub struct TreeBuilder<'a> {
    config: &'a SearchConfiguration,
    decisions: &'a FilterDecisions,
    diagnostics: &'a mut Diagnostics,
    summary: BuildSummary,
}

/// Add every usable record to `root`, then sort it.
pub fn build_tree(
    records: &[RawCatalogRecord],
    config: &SearchConfiguration,
    decisions: &FilterDecisions,
    root: &mut CatalogGroup,
    diagnostics: &mut Diagnostics,
) -> BuildSummary {
    let mut builder = TreeBuilder::new(config, decisions, diagnostics);
    for record in records {
        builder.add_record(record, root);
    }
    builder.finish(root)
}

impl<'a> TreeBuilder<'a> {
    pub fn new(
        config: &'a SearchConfiguration,
        decisions: &'a FilterDecisions,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            config,
            decisions,
            diagnostics,
            summary: BuildSummary::default(),
        }
    }

    /// Insert one record's items under each of its (non-blacklisted) groups.
    pub fn add_record(&mut self, record: &RawCatalogRecord, root: &mut CatalogGroup) {
        if self.config.is_blacklisted(&record.title) {
            self.diagnostics.push(DiagnosticEvent::BlacklistedRecord {
                title: record.title.clone(),
            });
            return;
        }

        let groups = self.allowed_groups(record);
        if groups.is_empty() {
            return;
        }

        let items = self.items_for(record);
        if items.is_empty() {
            return;
        }
        self.summary.records_used += 1;
        self.summary.items_created += items.len();

        for item in items {
            for group_name in &groups {
                let (group, created) = root.get_or_add_group(group_name);
                group.add_item(Arc::clone(&item));
                if created {
                    self.summary.groups_created += 1;
                }
            }
        }
    }

    /// Sort the root's children and each direct child group's children.
    pub fn finish(self, root: &mut CatalogGroup) -> BuildSummary {
        root.sort_children();
        for child in &mut root.children {
            if let CatalogNode::Group(group) = child {
                group.sort_children();
            }
        }

        info!(
            records = self.summary.records_used,
            items = self.summary.items_created,
            groups = self.summary.groups_created,
            "catalog tree built"
        );
        self.summary
    }

    fn allowed_groups(&mut self, record: &RawCatalogRecord) -> Vec<String> {
        let mut groups = Vec::with_capacity(record.groups.len());
        for group in &record.groups {
            if self.config.is_blacklisted(group) {
                self.diagnostics.push(DiagnosticEvent::BlacklistedGroup {
                    record: record.title.clone(),
                    group: group.clone(),
                });
            } else {
                groups.push(group.clone());
            }
        }
        groups
    }

    fn items_for(&mut self, record: &RawCatalogRecord) -> Vec<Arc<CatalogItem>> {
        let description = describe(record);
        let extras = record.extras_map();
        let rectangle = self.rectangle(record);
        let data_custodian = self
            .config
            .data_custodian
            .clone()
            .or_else(|| record.organization_custodian().map(String::from));

        let mut items = Vec::new();
        for resource in &record.resources {
            let Some(kind) = resource.service_kind() else {
                continue;
            };
            if !self.includes(kind) {
                continue;
            }
            let Some(url) = resource.url.as_deref() else {
                self.diagnostics.push(DiagnosticEvent::MissingResourceUrl {
                    record: record.title.clone(),
                    format: resource.format.clone(),
                });
                continue;
            };

            let key = ServerLayerKey::from_url(url);
            if self.decisions.is_excluded(&key) {
                self.diagnostics.push(DiagnosticEvent::CapabilityExcluded {
                    record: record.title.clone(),
                    endpoint: key.endpoint,
                    layer: key.layer,
                });
                continue;
            }

            let fields = ItemFields {
                name: record.title.clone(),
                description: description.clone(),
                url: strip_query(url).to_string(),
                layers: layer_name(url).unwrap_or_default(),
                rectangle,
                data_custodian: data_custodian.clone(),
                data_url: extras.get("data_url").cloned(),
                data_url_type: extras.get("data_url_type").cloned(),
                parameters: self.config.parameters.clone(),
            };
            let item = match kind {
                ItemKind::Wms => CatalogItem::wms(fields),
                ItemKind::EsriMapServer => CatalogItem::esri_map_server(fields),
            };
            items.push(Arc::new(item));
        }
        items
    }

    fn includes(&self, kind: ItemKind) -> bool {
        match kind {
            ItemKind::Wms => self.config.include_wms,
            ItemKind::EsriMapServer => self.config.include_esri_rest,
        }
    }

    fn rectangle(&mut self, record: &RawCatalogRecord) -> Option<Rectangle> {
        let coverage = record.geo_coverage.as_deref()?;
        match Rectangle::from_coverage(coverage) {
            Ok(rectangle) => Some(rectangle),
            Err(e) => {
                self.diagnostics.push(DiagnosticEvent::MalformedCoverage {
                    record: record.title.clone(),
                    coverage: coverage.to_string(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }
}

/// Notes with line breaks as `<br/>`, plus a licence link unless the
/// notes already mention the licence URL.
pub fn describe(record: &RawCatalogRecord) -> String {
    let notes = record.notes.as_deref().unwrap_or_default();
    let mut description = notes.replace("\r\n", "\n").replace('\n', "<br/>");

    if let Some(license_url) = record.license_url.as_deref() {
        if !notes.contains(license_url) {
            if !description.is_empty() {
                description.push_str("<br/>");
            }
            description.push_str(&format!("[Licence]({license_url})"));
        }
    }
    description
}
