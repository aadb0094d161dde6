//! Construction du contenu des rapports (visa texte et tableur)
//!
//! Les deux constructeurs sont purs: mêmes entrées, même sortie. L'horodatage
//! vient du [`ComparisonResult`], jamais de l'horloge.

pub mod sheet;
pub mod visa;

use serde::Serialize;

use crate::area::AreaBreakdown;
use crate::compare::ComparisonResult;
use crate::types::{GeometryExtract, Polyline};

pub use sheet::{build_spreadsheet, Cell, Sheet, Workbook};
pub use visa::{build_visa_text, VisaSummary};

/// Extraits utilisés pour le détail des rapports
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportInputs<'a> {
    pub projet: Option<&'a GeometryExtract>,
    pub existant: Option<&'a GeometryExtract>,
}

/// Côté d'une comparaison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Projet,
    Existant,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Projet => "Projet",
            Side::Existant => "Existant",
        }
    }

    pub fn upper(&self) -> &'static str {
        match self {
            Side::Projet => "PROJET",
            Side::Existant => "EXISTANT",
        }
    }
}

/// Nombre d'éléments d'un extrait présent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ElementCounts {
    pub polylines: usize,
    pub circles: usize,
}

impl ElementCounts {
    pub fn total(&self) -> usize {
        self.polylines + self.circles
    }
}

/// Détail d'un côté tel qu'envoyé au stockage des artefacts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SidePayload {
    pub surface: f64,
    /// Absent quand l'extrait n'a pas été fourni
    pub details: Option<ElementCounts>,
    pub polylines: Vec<Polyline>,
}

/// Charge utile `surfaces` des requêtes d'écriture d'artefacts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfacesPayload {
    pub projet: SidePayload,
    pub existant: SidePayload,
    pub difference: f64,
}

impl<'a> ReportInputs<'a> {
    pub fn new(projet: Option<&'a GeometryExtract>, existant: Option<&'a GeometryExtract>) -> Self {
        Self { projet, existant }
    }

    pub fn side(&self, side: Side) -> Option<&'a GeometryExtract> {
        match side {
            Side::Projet => self.projet,
            Side::Existant => self.existant,
        }
    }

    /// Compteurs d'éléments, `None` si l'extrait est absent
    pub fn counts(&self, side: Side) -> Option<ElementCounts> {
        self.side(side).map(|e| ElementCounts {
            polylines: e.polylines.len(),
            circles: e.circles.len(),
        })
    }

    pub fn breakdown(&self, side: Side) -> AreaBreakdown {
        AreaBreakdown::of(self.side(side))
    }

    /// Charge utile complète (surfaces, compteurs, polylignes) pour le stockage
    pub fn surfaces_payload(&self, comparison: &ComparisonResult) -> SurfacesPayload {
        let side_payload = |side: Side, surface: f64| SidePayload {
            surface,
            details: self.counts(side),
            polylines: self
                .side(side)
                .map(|e| e.polylines.clone())
                .unwrap_or_default(),
        };

        SurfacesPayload {
            projet: side_payload(Side::Projet, comparison.surface_projet()),
            existant: side_payload(Side::Existant, comparison.surface_existant()),
            difference: comparison.difference(),
        }
    }
}

/// Construit les deux rapports en parallèle
pub fn build_reports(comparison: &ComparisonResult, inputs: &ReportInputs<'_>) -> (String, Workbook) {
    rayon::join(
        || build_visa_text(comparison, inputs),
        || build_spreadsheet(comparison, inputs),
    )
}
