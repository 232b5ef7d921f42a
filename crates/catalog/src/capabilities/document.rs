use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("document has no Capability section")]
    MissingCapability,
}

/// A `<Layer>` from a capabilities document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityLayer {
    pub name: Option<String>,
    pub max_scale_denominator: Option<f64>,
    pub layers: Vec<CapabilityLayer>,
}

impl CapabilityLayer {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

/// The `Capability.Layer` forest of a WMS GetCapabilities response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilitiesDocument {
    pub layers: Vec<CapabilityLayer>,
}

impl CapabilitiesDocument {
    pub fn parse(xml: &str) -> Result<Self, CapabilityError> {
        let raw: RawDocument = quick_xml::de::from_str(xml)?;
        let capability = raw.capability.ok_or(CapabilityError::MissingCapability)?;
        Ok(Self {
            layers: capability.layers.into_iter().map(RawLayer::normalize).collect(),
        })
    }

    /// Every layer, pre-order.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: self.layers.iter().rev().collect(),
        }
    }
}

/// Pre-order iterator over a layer forest.
pub struct Walk<'a> {
    stack: Vec<&'a CapabilityLayer>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a CapabilityLayer;

    fn next(&mut self) -> Option<Self::Item> {
        let layer = self.stack.pop()?;
        self.stack.extend(layer.layers.iter().rev());
        Some(layer)
    }
}

// One `<Layer>` or many deserialize into the same Vec.

#[derive(Deserialize)]
struct RawDocument {
    #[serde(rename = "Capability")]
    capability: Option<RawCapability>,
}

#[derive(Deserialize)]
struct RawCapability {
    #[serde(rename = "Layer", default)]
    layers: Vec<RawLayer>,
}

#[derive(Deserialize)]
struct RawLayer {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "MaxScaleDenominator")]
    max_scale_denominator: Option<String>,
    #[serde(rename = "Layer", default)]
    layers: Vec<RawLayer>,
}

impl RawLayer {
    fn normalize(self) -> CapabilityLayer {
        CapabilityLayer {
            name: self
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            max_scale_denominator: self
                .max_scale_denominator
                .and_then(|s| s.trim().parse::<f64>().ok()),
            layers: self.layers.into_iter().map(RawLayer::normalize).collect(),
        }
    }
}
