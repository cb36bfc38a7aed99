use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::params::TargetType;

/// Maps an object name to a target type.
///
/// Implementations may be slow or fail (network lookups); the pipeline treats
/// any error as an unknown target.
pub trait TargetClassifier: Send + Sync {
    fn classify(&self, object_name: &str) -> Result<TargetType>;
}

/// Outcome of a catalog lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub target_type: TargetType,
    pub object_name: String,
    /// 1.0 for named showcase objects, lower for catalog-prefix guesses
    pub confidence: f64,
}

const KNOWN_OBJECTS: &[(&str, TargetType)] = &[
    ("M42", TargetType::EmissionNebula),
    ("M43", TargetType::EmissionNebula),
    ("M1", TargetType::EmissionNebula),
    ("M8", TargetType::EmissionNebula),
    ("M16", TargetType::EmissionNebula),
    ("M17", TargetType::EmissionNebula),
    ("M20", TargetType::EmissionNebula),
    ("NGC 7000", TargetType::EmissionNebula),
    ("NGC 6992", TargetType::EmissionNebula),
    ("NGC 6960", TargetType::EmissionNebula),
    ("IC 1805", TargetType::EmissionNebula),
    ("IC 1848", TargetType::EmissionNebula),
    ("IC 434", TargetType::EmissionNebula),
    ("M78", TargetType::ReflectionNebula),
    ("M27", TargetType::PlanetaryNebula),
    ("M57", TargetType::PlanetaryNebula),
    ("M76", TargetType::PlanetaryNebula),
    ("M97", TargetType::PlanetaryNebula),
    ("NGC 6543", TargetType::PlanetaryNebula),
    ("NGC 7293", TargetType::PlanetaryNebula),
    ("M31", TargetType::Galaxy),
    ("M32", TargetType::Galaxy),
    ("M33", TargetType::Galaxy),
    ("M51", TargetType::Galaxy),
    ("M81", TargetType::Galaxy),
    ("M82", TargetType::Galaxy),
    ("M101", TargetType::Galaxy),
    ("M104", TargetType::Galaxy),
    ("NGC 253", TargetType::Galaxy),
    ("NGC 891", TargetType::Galaxy),
    ("M2", TargetType::GlobularCluster),
    ("M3", TargetType::GlobularCluster),
    ("M5", TargetType::GlobularCluster),
    ("M13", TargetType::GlobularCluster),
    ("M15", TargetType::GlobularCluster),
    ("M22", TargetType::GlobularCluster),
    ("M92", TargetType::GlobularCluster),
    ("NGC 5139", TargetType::GlobularCluster),
    ("M6", TargetType::OpenCluster),
    ("M7", TargetType::OpenCluster),
    ("M11", TargetType::OpenCluster),
    ("M35", TargetType::OpenCluster),
    ("M36", TargetType::OpenCluster),
    ("M37", TargetType::OpenCluster),
    ("M38", TargetType::OpenCluster),
    ("M44", TargetType::OpenCluster),
    ("M45", TargetType::OpenCluster),
    ("M67", TargetType::OpenCluster),
    ("NGC 869", TargetType::OpenCluster),
    ("NGC 884", TargetType::OpenCluster),
];

// Catalog prefixes, tried in order
const CATALOG_PATTERNS: &[(&str, TargetType, f64)] = &[
    // Sharpless
    (r"(?i)^Sh\s*2[-\s]*\d+", TargetType::EmissionNebula, 0.9),
    // Barnard dark nebulae
    (r"(?i)^B\s*\d+", TargetType::StarField, 0.7),
    (r"(?i)^LBN\s*\d+", TargetType::EmissionNebula, 0.8),
    (r"(?i)^LDN\s*\d+", TargetType::StarField, 0.7),
    (r"(?i)^vdB\s*\d+", TargetType::ReflectionNebula, 0.9),
    // Also used for galaxy clusters
    (r"(?i)^Abell\s*\d+", TargetType::PlanetaryNebula, 0.6),
];

/// Offline classifier backed by a table of well-known objects and catalog
/// name patterns
pub struct CatalogClassifier {
    known: HashMap<&'static str, TargetType>,
    patterns: Vec<(Regex, TargetType, f64)>,
    messier: Regex,
    ngc: Regex,
    ic: Regex,
}

impl CatalogClassifier {
    pub fn new() -> Result<Self> {
        let patterns = CATALOG_PATTERNS
            .iter()
            .map(|&(pattern, target, confidence)| {
                Regex::new(pattern)
                    .with_context(|| format!("Invalid catalog pattern {}", pattern))
                    .map(|re| (re, target, confidence))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            known: KNOWN_OBJECTS.iter().copied().collect(),
            patterns,
            messier: Regex::new(r"^MESSIER\s*")?,
            ngc: Regex::new(r"^NGC\s*")?,
            ic: Regex::new(r"^IC\s*")?,
        })
    }

    /// Upper-case and canonicalize catalog prefixes: `messier 42` -> `M42`,
    /// `ngc7000` -> `NGC 7000`
    pub fn normalize(&self, name: &str) -> String {
        let name = name.trim().to_uppercase();
        let name = self.messier.replace(&name, "M");
        let name = self.ngc.replace(&name, "NGC ");
        self.ic.replace(&name, "IC ").into_owned()
    }

    pub fn classify_detailed(&self, object_name: &str) -> TargetInfo {
        let normalized = self.normalize(object_name);

        let (target_type, confidence) = if let Some(&target) = self.known.get(normalized.as_str()) {
            (target, 1.0)
        } else if let Some((_, target, confidence)) =
            self.patterns.iter().find(|(re, _, _)| re.is_match(&normalized))
        {
            (*target, *confidence)
        } else {
            (TargetType::Unknown, 0.0)
        };

        debug!(
            "Classified '{}' (normalized '{}') as {} with confidence {}",
            object_name, normalized, target_type, confidence
        );

        TargetInfo {
            target_type,
            object_name: object_name.to_string(),
            confidence,
        }
    }
}

impl TargetClassifier for CatalogClassifier {
    fn classify(&self, object_name: &str) -> Result<TargetType> {
        Ok(self.classify_detailed(object_name).target_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> CatalogClassifier {
        CatalogClassifier::new().unwrap()
    }

    #[test]
    fn test_normalize() {
        let c = classifier();
        assert_eq!(c.normalize("  messier 42 "), "M42");
        assert_eq!(c.normalize("ngc7000"), "NGC 7000");
        assert_eq!(c.normalize("NGC   891"), "NGC 891");
        assert_eq!(c.normalize("ic434"), "IC 434");
        assert_eq!(c.normalize("m31"), "M31");
    }

    #[test]
    fn test_known_objects() {
        let c = classifier();
        assert_eq!(c.classify("M42").unwrap(), TargetType::EmissionNebula);
        assert_eq!(c.classify("Messier 31").unwrap(), TargetType::Galaxy);
        assert_eq!(c.classify("m57").unwrap(), TargetType::PlanetaryNebula);
        assert_eq!(c.classify("NGC5139").unwrap(), TargetType::GlobularCluster);
        assert_eq!(c.classify("M45").unwrap(), TargetType::OpenCluster);
        assert_eq!(c.classify("M78").unwrap(), TargetType::ReflectionNebula);

        let info = c.classify_detailed("ic 1805");
        assert_eq!(info.target_type, TargetType::EmissionNebula);
        assert_eq!(info.confidence, 1.0);
        assert_eq!(info.object_name, "ic 1805");
    }

    #[test]
    fn test_catalog_patterns() {
        let c = classifier();
        let info = c.classify_detailed("Sh2-155");
        assert_eq!(info.target_type, TargetType::EmissionNebula);
        assert_eq!(info.confidence, 0.9);

        assert_eq!(c.classify("B33").unwrap(), TargetType::StarField);
        assert_eq!(c.classify("LBN 331").unwrap(), TargetType::EmissionNebula);
        assert_eq!(c.classify("LDN 1235").unwrap(), TargetType::StarField);
        assert_eq!(c.classify("vdB 152").unwrap(), TargetType::ReflectionNebula);
        assert_eq!(c.classify("Abell 39").unwrap(), TargetType::PlanetaryNebula);
    }

    #[test]
    fn test_unknown_names() {
        let c = classifier();
        for name in ["", "Betelgeuse", "M999", "NGC 1"] {
            let info = c.classify_detailed(name);
            assert_eq!(info.target_type, TargetType::Unknown, "{}", name);
            assert_eq!(info.confidence, 0.0);
        }
    }

    #[test]
    fn test_target_info_json() {
        let info = classifier().classify_detailed("M13");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["targetType"], "globular_cluster");
        assert_eq!(json["objectName"], "M13");
        assert_eq!(json["confidence"], 1.0);
    }
}
