use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Coarse astrophysical category used to pick default processing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetType {
    EmissionNebula,
    ReflectionNebula,
    PlanetaryNebula,
    Galaxy,
    GlobularCluster,
    OpenCluster,
    StarField,
    Unknown,
}

impl TargetType {
    pub const ALL: [TargetType; 8] = [
        TargetType::EmissionNebula,
        TargetType::ReflectionNebula,
        TargetType::PlanetaryNebula,
        TargetType::Galaxy,
        TargetType::GlobularCluster,
        TargetType::OpenCluster,
        TargetType::StarField,
        TargetType::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::EmissionNebula => "emission_nebula",
            TargetType::ReflectionNebula => "reflection_nebula",
            TargetType::PlanetaryNebula => "planetary_nebula",
            TargetType::Galaxy => "galaxy",
            TargetType::GlobularCluster => "globular_cluster",
            TargetType::OpenCluster => "open_cluster",
            TargetType::StarField => "star_field",
            TargetType::Unknown => "unknown",
        }
    }

    /// Parse a target name; unrecognized names map to `Unknown`
    pub fn parse_lenient(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        match TargetType::ALL.iter().find(|t| t.as_str() == name) {
            Some(t) => *t,
            None => {
                warn!("Unrecognized target type '{}', using unknown", name);
                TargetType::Unknown
            }
        }
    }

    /// Default processing settings for this kind of target
    pub fn defaults(&self) -> &'static TargetDefaults {
        &TARGET_DEFAULTS[*self as usize]
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TargetType {
    fn from(value: String) -> Self {
        TargetType::parse_lenient(&value)
    }
}

impl From<TargetType> for String {
    fn from(value: TargetType) -> Self {
        value.as_str().to_string()
    }
}

/// Either infer the target type from the object name, or use a fixed one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetSelection {
    #[default]
    Auto,
    Fixed(TargetType),
}

impl fmt::Display for TargetSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSelection::Auto => f.write_str("auto"),
            TargetSelection::Fixed(t) => t.fmt(f),
        }
    }
}

impl From<String> for TargetSelection {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("auto") {
            TargetSelection::Auto
        } else {
            TargetSelection::Fixed(TargetType::parse_lenient(&value))
        }
    }
}

impl From<TargetSelection> for String {
    fn from(value: TargetSelection) -> Self {
        value.to_string()
    }
}

/// Dynamic-range stretch algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StretchMethod {
    /// Percentile clip followed by a gamma solve toward the target median
    #[default]
    Statistical,
    Arcsinh,
    Log,
}

impl StretchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            StretchMethod::Statistical => "statistical",
            StretchMethod::Arcsinh => "arcsinh",
            StretchMethod::Log => "log",
        }
    }

    /// Parse a method name; unrecognized names fall back to statistical
    pub fn parse_lenient(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "statistical" => StretchMethod::Statistical,
            "arcsinh" => StretchMethod::Arcsinh,
            "log" => StretchMethod::Log,
            other => {
                warn!("Unrecognized stretch method '{}', using statistical", other);
                StretchMethod::Statistical
            }
        }
    }
}

impl fmt::Display for StretchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for StretchMethod {
    fn from(value: String) -> Self {
        StretchMethod::parse_lenient(&value)
    }
}

impl From<StretchMethod> for String {
    fn from(value: StretchMethod) -> Self {
        value.as_str().to_string()
    }
}

/// Per-target defaults
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDefaults {
    pub stretch_factor: f64,
    /// Informational; the user's background removal flag always wins
    pub background_removal: bool,
    pub star_reduction: bool,
    pub saturation_boost: f64,
}

/// Indexed by `TargetType as usize`
static TARGET_DEFAULTS: [TargetDefaults; 8] = [
    // Emission nebula
    TargetDefaults {
        stretch_factor: 0.18,
        background_removal: true,
        star_reduction: true,
        saturation_boost: 1.2,
    },
    // Reflection nebula: keep the blue halos around stars
    TargetDefaults {
        stretch_factor: 0.15,
        background_removal: true,
        star_reduction: false,
        saturation_boost: 1.1,
    },
    // Planetary nebula
    TargetDefaults {
        stretch_factor: 0.20,
        background_removal: true,
        star_reduction: false,
        saturation_boost: 1.15,
    },
    // Galaxy
    TargetDefaults {
        stretch_factor: 0.12,
        background_removal: true,
        star_reduction: false,
        saturation_boost: 1.0,
    },
    // Globular cluster: stars are the subject
    TargetDefaults {
        stretch_factor: 0.10,
        background_removal: true,
        star_reduction: false,
        saturation_boost: 1.0,
    },
    // Open cluster
    TargetDefaults {
        stretch_factor: 0.08,
        background_removal: true,
        star_reduction: false,
        saturation_boost: 1.0,
    },
    // Star field
    TargetDefaults {
        stretch_factor: 0.05,
        background_removal: false,
        star_reduction: false,
        saturation_boost: 1.0,
    },
    // Unknown
    TargetDefaults {
        stretch_factor: 0.15,
        background_removal: true,
        star_reduction: false,
        saturation_boost: 1.0,
    },
];

/// User-facing processing parameters. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingParams {
    pub target_type: TargetSelection,
    pub stretch_method: StretchMethod,
    /// Target median for the stretch; 0 means use the target-type default
    pub stretch_factor: f64,
    pub background_removal: bool,
    pub star_reduction: bool,
    pub color_calibration: bool,
    /// Noise reduction strength, 0-1
    pub noise_reduction: f64,
    /// Contrast multiplier, 1.0 leaves the image untouched
    pub contrast: f64,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            target_type: TargetSelection::Auto,
            stretch_method: StretchMethod::Statistical,
            stretch_factor: 0.0,
            background_removal: true,
            star_reduction: false,
            color_calibration: true,
            noise_reduction: 0.0,
            contrast: 1.0,
        }
    }
}

impl ProcessingParams {
    /// Parameters pre-filled with a target type's defaults
    pub fn defaults_for(target: TargetType) -> Self {
        let defaults = target.defaults();
        Self {
            target_type: TargetSelection::Fixed(target),
            stretch_factor: defaults.stretch_factor,
            background_removal: defaults.background_removal,
            star_reduction: defaults.star_reduction,
            ..Self::default()
        }
    }

    /// Merge user settings with the defaults of `target`.
    ///
    /// A positive stretch factor overrides the table, star reduction is the
    /// OR of the user flag and the table, and background removal is always
    /// the user's choice.
    pub fn resolve(&self, target: TargetType) -> ResolvedParams {
        let defaults = target.defaults();
        let stretch_factor = if self.stretch_factor > 0.0 {
            self.stretch_factor
        } else {
            defaults.stretch_factor
        };

        ResolvedParams {
            target_type: target,
            stretch_method: self.stretch_method,
            stretch_factor,
            background_removal: self.background_removal,
            star_reduction: self.star_reduction || defaults.star_reduction,
            color_calibration: self.color_calibration,
            noise_reduction: if self.noise_reduction.is_finite() {
                self.noise_reduction.clamp(0.0, 1.0)
            } else {
                0.0
            },
            contrast: if self.contrast.is_finite() {
                self.contrast.max(1.0)
            } else {
                1.0
            },
        }
    }
}

/// Effective settings for one pipeline run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedParams {
    pub target_type: TargetType,
    pub stretch_method: StretchMethod,
    pub stretch_factor: f64,
    pub background_removal: bool,
    pub star_reduction: bool,
    pub color_calibration: bool,
    pub noise_reduction: f64,
    pub contrast: f64,
}

impl ResolvedParams {
    /// Echo in the user-facing schema
    pub fn to_params(&self) -> ProcessingParams {
        ProcessingParams {
            target_type: TargetSelection::Fixed(self.target_type),
            stretch_method: self.stretch_method,
            stretch_factor: self.stretch_factor,
            background_removal: self.background_removal,
            star_reduction: self.star_reduction,
            color_calibration: self.color_calibration,
            noise_reduction: self.noise_reduction,
            contrast: self.contrast,
        }
    }
}
