//! Comparaison des surfaces projet / existant et politique de seuil

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::area::compute_area;
use crate::types::GeometryExtract;
use crate::SurfaceError;

/// Nom d'étage utilisé quand l'utilisateur n'en saisit pas
pub const DEFAULT_FLOOR_NAME: &str = "Sans nom";

/// Résultat d'une comparaison de surfaces.
///
/// Immuable: `difference` est calculée à la construction et vaut toujours
/// `surface_projet - surface_existant`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    surface_projet: f64,
    surface_existant: f64,
    difference: f64,
    floor_name: String,
    timestamp: DateTime<Utc>,
}

/// Sens de l'évolution de surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Impact {
    Agrandissement,
    Reduction,
    Inchange,
}

impl Impact {
    pub fn label(&self) -> &'static str {
        match self {
            Impact::Agrandissement => "Agrandissement",
            Impact::Reduction => "Réduction",
            Impact::Inchange => "Pas de changement",
        }
    }
}

impl ComparisonResult {
    fn new(
        surface_projet: f64,
        surface_existant: f64,
        floor_name: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let floor_name = if floor_name.trim().is_empty() {
            DEFAULT_FLOOR_NAME.to_string()
        } else {
            floor_name.to_string()
        };

        Self {
            surface_projet,
            surface_existant,
            difference: surface_projet - surface_existant,
            floor_name,
            timestamp,
        }
    }

    pub fn surface_projet(&self) -> f64 {
        self.surface_projet
    }

    pub fn surface_existant(&self) -> f64 {
        self.surface_existant
    }

    pub fn difference(&self) -> f64 {
        self.difference
    }

    pub fn floor_name(&self) -> &str {
        &self.floor_name
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Écart en pourcentage de l'existant (absent si l'existant est nul)
    pub fn percent_of_existant(&self) -> Option<f64> {
        (self.surface_existant > 0.0).then(|| self.difference / self.surface_existant * 100.0)
    }

    pub fn impact(&self) -> Impact {
        if self.difference > 0.0 {
            Impact::Agrandissement
        } else if self.difference < 0.0 {
            Impact::Reduction
        } else {
            Impact::Inchange
        }
    }
}

/// Compare les surfaces d'un extrait projet et d'un extrait existant.
///
/// # Errors
///
/// - `MissingInput` si aucun des deux extraits n'est fourni
/// - `ThresholdViolation` si un seuil est fourni et que la surface projet
///   lui est strictement inférieure (aucun résultat n'est produit)
pub fn compare(
    projet: Option<&GeometryExtract>,
    existant: Option<&GeometryExtract>,
    floor_name: &str,
    threshold: Option<f64>,
    timestamp: DateTime<Utc>,
) -> Result<ComparisonResult, SurfaceError> {
    if projet.is_none() && existant.is_none() {
        return Err(SurfaceError::MissingInput);
    }

    let surface_projet = compute_area(projet);
    let surface_existant = compute_area(existant);

    if let Some(threshold) = threshold.filter(|t| !t.is_nan()) {
        if surface_projet < threshold {
            info!(
                surface_projet = surface_projet,
                threshold = threshold,
                "Surface projet below threshold"
            );
            return Err(SurfaceError::ThresholdViolation {
                surface_projet,
                threshold,
            });
        }
    }

    let result = ComparisonResult::new(surface_projet, surface_existant, floor_name, timestamp);
    debug!(
        floor = %result.floor_name,
        projet = result.surface_projet,
        existant = result.surface_existant,
        difference = result.difference,
        "Comparison computed"
    );
    Ok(result)
}

/// Interprète la saisie libre du seuil.
///
/// Lecture permissive du préfixe numérique (`"12.5 m²"` -> `12.5`,
/// `"1e3"` -> `1000`, `"Infinity"` -> `+∞`). Une saisie vide ou non
/// numérique donne `None`: aucun seuil n'est appliqué.
pub fn parse_threshold(input: &str) -> Option<f64> {
    static NUMERIC_PREFIX: OnceLock<Option<Regex>> = OnceLock::new();
    let re = NUMERIC_PREFIX
        .get_or_init(|| {
            Regex::new(r"^[+-]?(?:Infinity|(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)").ok()
        })
        .as_ref()?;

    let prefix = re.find(input.trim_start())?.as_str();
    prefix.parse::<f64>().ok().filter(|v| !v.is_nan())
}
