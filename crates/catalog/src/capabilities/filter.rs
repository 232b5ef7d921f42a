use std::collections::{BTreeMap, BTreeSet};

use super::document::CapabilitiesDocument;
use super::Decision;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};

/// Decide which `candidates` one server actually offers.
///
/// Every candidate starts excluded. A named layer in the document clears
/// its candidate unless `threshold` is set and the layer's
/// `MaxScaleDenominator` is below it (equal passes). Once included, a
/// candidate stays included even if a later duplicate fails the scale check.
pub fn filter_layers(
    endpoint: &str,
    document: &CapabilitiesDocument,
    candidates: &BTreeSet<String>,
    threshold: Option<f64>,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<String, Decision> {
    let mut decisions: BTreeMap<String, Decision> = candidates
        .iter()
        .map(|layer| (layer.clone(), Decision::Excluded))
        .collect();

    for layer in document.walk() {
        let Some(name) = layer.name.as_deref() else {
            continue;
        };
        let Some(decision) = decisions.get_mut(name) else {
            continue;
        };

        match (threshold, layer.max_scale_denominator) {
            (Some(threshold), Some(ceiling)) if ceiling < threshold => {
                diagnostics.push(DiagnosticEvent::ScaleExcluded {
                    endpoint: endpoint.to_string(),
                    layer: name.to_string(),
                    max_scale_denominator: ceiling,
                    threshold,
                });
            }
            _ => *decision = Decision::Included,
        }
    }

    decisions
}
