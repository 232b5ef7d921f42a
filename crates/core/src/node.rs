//! The catalog tree handed to the map browser.
//!
//! Groups own their children. Items are reference-counted so the same
//! layer can be listed under every group its record belongs to.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use crate::record::Rectangle;

/// Rendering backend for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Wms,
    EsriMapServer,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Wms => "wms",
            ItemKind::EsriMapServer => "esri-mapServer",
        }
    }
}

/// Fields shared by both item constructors.
#[derive(Debug, Clone, Default)]
pub struct ItemFields {
    pub name: String,
    pub description: String,
    pub url: String,
    pub layers: String,
    pub rectangle: Option<Rectangle>,
    pub data_custodian: Option<String>,
    pub data_url: Option<String>,
    pub data_url_type: Option<String>,
    pub parameters: BTreeMap<String, String>,
}

/// A displayable map layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogItem {
    pub kind: ItemKind,
    pub name: String,
    pub description: String,
    pub url: String,
    pub layers: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rectangle: Option<Rectangle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_custodian: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url_type: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

impl CatalogItem {
    /// A layer served by a Web Map Service.
    pub fn wms(fields: ItemFields) -> Self {
        Self::with_kind(ItemKind::Wms, fields)
    }

    /// A layer served by an Esri ArcGIS MapServer REST endpoint.
    pub fn esri_map_server(fields: ItemFields) -> Self {
        Self::with_kind(ItemKind::EsriMapServer, fields)
    }

    fn with_kind(kind: ItemKind, fields: ItemFields) -> Self {
        Self {
            kind,
            name: fields.name,
            description: fields.description,
            url: fields.url,
            layers: fields.layers,
            rectangle: fields.rectangle,
            data_custodian: fields.data_custodian,
            data_url: fields.data_url,
            data_url_type: fields.data_url_type,
            parameters: fields.parameters,
        }
    }
}

/// A child of a group.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum CatalogNode {
    Group(CatalogGroup),
    Item(Arc<CatalogItem>),
}

impl CatalogNode {
    pub fn name(&self) -> &str {
        match self {
            CatalogNode::Group(group) => &group.name,
            CatalogNode::Item(item) => &item.name,
        }
    }

    pub fn as_group(&self) -> Option<&CatalogGroup> {
        match self {
            CatalogNode::Group(group) => Some(group),
            CatalogNode::Item(_) => None,
        }
    }

    pub fn as_item(&self) -> Option<&Arc<CatalogItem>> {
        match self {
            CatalogNode::Item(item) => Some(item),
            CatalogNode::Group(_) => None,
        }
    }
}

/// A named, ordered container of groups and items.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogGroup {
    pub name: String,
    pub children: Vec<CatalogNode>,
}

impl CatalogGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn add(&mut self, node: CatalogNode) {
        self.children.push(node);
    }

    pub fn add_item(&mut self, item: Arc<CatalogItem>) {
        self.children.push(CatalogNode::Item(item));
    }

    /// First direct child with exactly this name.
    pub fn find(&self, name: &str) -> Option<&CatalogNode> {
        self.children.iter().find(|c| c.name() == name)
    }

    /// First direct child group with exactly this name.
    pub fn find_group_mut(&mut self, name: &str) -> Option<&mut CatalogGroup> {
        self.children.iter_mut().find_map(|c| match c {
            CatalogNode::Group(group) if group.name == name => Some(group),
            _ => None,
        })
    }

    /// The direct child group named `name`, appended when missing.
    /// The flag is `true` when the group was created by this call.
    pub fn get_or_add_group(&mut self, name: &str) -> (&mut CatalogGroup, bool) {
        let existing = self
            .children
            .iter()
            .position(|c| matches!(c, CatalogNode::Group(g) if g.name == name));
        let (index, created) = match existing {
            Some(index) => (index, false),
            None => {
                self.children.push(CatalogNode::Group(CatalogGroup::new(name)));
                (self.children.len() - 1, true)
            }
        };
        match &mut self.children[index] {
            CatalogNode::Group(group) => (group, created),
            CatalogNode::Item(_) => unreachable!("position matched a group"),
        }
    }

    /// Stable, case-insensitive sort of the direct children.
    pub fn sort_children(&mut self) {
        self.children.sort_by(|a, b| compare_names(a.name(), b.name()));
    }

    /// Number of item slots in this subtree (a shared item counts once per group).
    pub fn item_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| match c {
                CatalogNode::Group(group) => group.item_count(),
                CatalogNode::Item(_) => 1,
            })
            .sum()
    }

    /// Render the subtree as an indented outline, one node per line.
    pub fn to_outline(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}/", self.name);
        self.write_outline(&mut out, 1);
        out
    }

    fn write_outline(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        for child in &self.children {
            match child {
                CatalogNode::Group(group) => {
                    let _ = writeln!(out, "{indent}{}/", group.name);
                    group.write_outline(out, depth + 1);
                }
                CatalogNode::Item(item) => {
                    let _ = writeln!(
                        out,
                        "{indent}{} [{}] {} {}",
                        item.name,
                        item.kind.as_str(),
                        item.url,
                        item.layers
                    );
                }
            }
        }
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}
