//! Constellation stick figures and star distances.
//!
//! A built-in catalog covers Orion, Lepus, Eridanus and Ursa Major. A JSON
//! catalog of the same shape can replace it.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::overlay::Color;
use crate::error::CatalogError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStar {
    /// Spelled-out catalog pattern, e.g. `Alpha Ori`.
    pub name: String,
    pub distance_ly: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constellation {
    pub name: String,
    #[serde(default = "default_color")]
    pub color: Color,
    /// Star-name pattern pairs to join with a line.
    pub lines: Vec<(String, String)>,
}

fn default_color() -> Color {
    Color::Lime
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub stars: Vec<CatalogStar>,
    pub constellations: Vec<Constellation>,
    #[serde(skip)]
    distances: HashMap<String, f64>,
}

const ORION_DISTANCES: &[(&str, f64)] = &[
    ("Alpha Ori", 642.5),
    ("Beta Ori", 863.0),
    ("Gamma Ori", 250.0),
    ("Delta Ori", 1200.0),
    ("Epsilon Ori", 2000.0),
    ("Zeta Ori", 1260.0),
    ("Kappa Ori", 724.0),
    ("Lambda Ori", 1100.0),
    ("Iota Ori", 1300.0),
    ("Eta Ori", 900.0),
    ("Mu Ori", 150.0),
    ("Xi Ori", 1200.0),
    ("Nu Ori", 500.0),
    ("Pi3 Ori", 26.0),
    ("Pi2 Ori", 220.0),
    ("Pi1 Ori", 120.0),
    ("Pi4 Ori", 1000.0),
    ("Pi5 Ori", 1300.0),
    ("Pi6 Ori", 900.0),
];

const LEPUS_DISTANCES: &[(&str, f64)] = &[
    ("Alpha Lep", 2200.0),
    ("Beta Lep", 160.0),
    ("Epsilon Lep", 213.0),
    ("Mu Lep", 186.0),
    ("Zeta Lep", 70.0),
    ("Gamma Lep", 29.0),
    ("Delta Lep", 114.0),
];

const ERIDANUS_DISTANCES: &[(&str, f64)] = &[("Beta Eri", 89.0), ("Lambda Eri", 58.0)];

const URSA_MAJOR_DISTANCES: &[(&str, f64)] = &[
    ("Alpha UMa", 123.0),
    ("Beta UMa", 79.0),
    ("Gamma UMa", 83.0),
    ("Delta UMa", 80.0),
    ("Epsilon UMa", 82.0),
    ("Zeta UMa", 78.0),
    ("Eta UMa", 103.0),
];

const ORION_LINES: &[(&str, &str)] = &[
    ("Alpha Ori", "Lambda Ori"),
    ("Lambda Ori", "Gamma Ori"),
    ("Gamma Ori", "Delta Ori"),
    ("Delta Ori", "Epsilon Ori"),
    ("Epsilon Ori", "Zeta Ori"),
    ("Zeta Ori", "Kappa Ori"),
    ("Kappa Ori", "Beta Ori"),
    ("Beta Ori", "Eta Ori"),
    ("Eta Ori", "Delta Ori"),
    ("Alpha Ori", "Mu Ori"),
    ("Mu Ori", "Xi Ori"),
    ("Xi Ori", "Nu Ori"),
    ("Gamma Ori", "Pi3 Ori"),
    ("Pi3 Ori", "Pi2 Ori"),
    ("Pi2 Ori", "Pi1 Ori"),
    ("Pi3 Ori", "Pi4 Ori"),
    ("Pi4 Ori", "Pi5 Ori"),
    ("Pi5 Ori", "Pi6 Ori"),
];

const LEPUS_LINES: &[(&str, &str)] = &[
    ("Alpha Lep", "Beta Lep"),
    ("Beta Lep", "Epsilon Lep"),
    ("Epsilon Lep", "Mu Lep"),
    ("Mu Lep", "Zeta Lep"),
    ("Zeta Lep", "Gamma Lep"),
    ("Gamma Lep", "Delta Lep"),
    ("Delta Lep", "Alpha Lep"),
];

const ERIDANUS_LINES: &[(&str, &str)] = &[("Beta Eri", "Lambda Eri")];

const URSA_MAJOR_LINES: &[(&str, &str)] = &[
    ("Alpha UMa", "Beta UMa"),
    ("Beta UMa", "Gamma UMa"),
    ("Gamma UMa", "Delta UMa"),
    ("Delta UMa", "Epsilon UMa"),
    ("Epsilon UMa", "Zeta UMa"),
    ("Zeta UMa", "Eta UMa"),
];

fn constellation(name: &str, color: Color, lines: &[(&str, &str)]) -> Constellation {
    Constellation {
        name: name.to_string(),
        color,
        lines: lines
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect(),
    }
}

impl Catalog {
    pub fn new(stars: Vec<CatalogStar>, constellations: Vec<Constellation>) -> Self {
        let mut catalog = Self {
            stars,
            constellations,
            distances: HashMap::new(),
        };
        catalog.index();
        catalog
    }

    pub fn builtin() -> Self {
        let stars = [
            ORION_DISTANCES,
            LEPUS_DISTANCES,
            ERIDANUS_DISTANCES,
            URSA_MAJOR_DISTANCES,
        ]
        .iter()
        .flat_map(|table| table.iter())
        .map(|(name, distance_ly)| CatalogStar {
            name: name.to_string(),
            distance_ly: *distance_ly,
        })
        .collect();

        let constellations = vec![
            constellation("Ori", Color::Lime, ORION_LINES),
            constellation("Lep", Color::Cyan, LEPUS_LINES),
            constellation("Eri", Color::Magenta, ERIDANUS_LINES),
            constellation("Ursa Major", Color::Yellow, URSA_MAJOR_LINES),
        ];

        Self::new(stars, constellations)
    }

    pub fn from_json_str(content: &str) -> Result<Self, CatalogError> {
        let mut catalog: Catalog = serde_json::from_str(content)?;
        catalog.validate()?;
        catalog.index();
        Ok(catalog)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|e| CatalogError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&content)
    }

    /// The catalog at `path`, or the built-in one when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::builtin()),
        }
    }

    fn index(&mut self) {
        self.distances = self
            .stars
            .iter()
            .map(|s| (s.name.clone(), s.distance_ly))
            .collect();
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for star in &self.stars {
            if star.name.trim().is_empty() {
                return Err(CatalogError::Invalid("star with an empty name".into()));
            }
            if !star.distance_ly.is_finite() || star.distance_ly <= 0.0 {
                return Err(CatalogError::Invalid(format!(
                    "star '{}' has a non-positive distance",
                    star.name
                )));
            }
            if !seen.insert(star.name.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "star '{}' listed twice",
                    star.name
                )));
            }
        }

        for figure in &self.constellations {
            if figure.name.trim().is_empty() {
                return Err(CatalogError::Invalid(
                    "constellation with an empty name".into(),
                ));
            }
            for (a, b) in &figure.lines {
                if a.trim().is_empty() || b.trim().is_empty() {
                    return Err(CatalogError::Invalid(format!(
                        "constellation '{}' has a line with an empty endpoint",
                        figure.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Distance in light-years for a catalog pattern, when known.
    pub fn distance_ly(&self, pattern: &str) -> Option<f64> {
        self.distances.get(pattern).copied()
    }

    pub fn constellation(&self, name: &str) -> Option<&Constellation> {
        self.constellations.iter().find(|c| c.name == name)
    }

    pub fn line_count(&self) -> usize {
        self.constellations.iter().map(|c| c.lines.len()).sum()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
