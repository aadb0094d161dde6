//! Calcul de surface d'un extrait DXF
//!
//! Polylignes: formule du lacet (shoelace) sur les paires de sommets
//! consécutifs `i, i+1`, sans le terme de fermeture dernier -> premier.
//! La séquence est considérée comme déjà fermée par l'extracteur. Pour un
//! contour qui ne repasse pas par son premier sommet, le résultat diffère de
//! l'aire réelle du polygone: c'est le comportement des rapports existants.
//!
//! [`ring_area`] donne au contraire l'aire du contour refermé; elle sert aux
//! surfaces par destination du tableur.
//!
//! Cercles: `π r²` pour tout rayon fini strictement positif.

use std::f64::consts::PI;

use geo::{Area, Coord, LineString, Polygon};
use serde::Serialize;
use tracing::debug;

use crate::types::{Circle, GeometryExtract, Polyline};

/// Nombre minimal de sommets pour qu'une polyligne contribue
pub const MIN_POLYLINE_VERTICES: usize = 3;

/// Surface d'une polyligne (0 si moins de 3 sommets)
pub fn polyline_area(polyline: &Polyline) -> f64 {
    let vertices = &polyline.vertices;
    if vertices.len() < MIN_POLYLINE_VERTICES {
        return 0.0;
    }

    let signed: f64 = vertices
        .windows(2)
        .map(|pair| pair[0].x * pair[1].y - pair[1].x * pair[0].y)
        .sum();

    signed.abs() / 2.0
}

/// Aire du polygone fermé formé par les sommets (0 si moins de 3 sommets)
pub fn ring_area(polyline: &Polyline) -> f64 {
    if polyline.vertices.len() < MIN_POLYLINE_VERTICES {
        return 0.0;
    }
    let coords: Vec<Coord> = polyline.vertices.iter().map(|&v| v.into()).collect();
    Polygon::new(LineString::new(coords), vec![]).unsigned_area()
}

/// Surface d'un cercle (0 si rayon absent, nul, négatif ou non fini)
pub fn circle_area(circle: &Circle) -> f64 {
    match circle.radius {
        Some(r) if r.is_finite() && r > 0.0 => PI * r.powi(2),
        _ => 0.0,
    }
}

/// Détail du calcul de surface d'un extrait
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AreaBreakdown {
    /// Surface de chaque polyligne, dans l'ordre de l'extrait
    pub polylines: Vec<f64>,
    /// Somme des surfaces de polylignes
    pub polyline_total: f64,
    /// Nombre de cercles
    pub circle_count: usize,
    /// Somme des surfaces de cercles
    pub circle_total: f64,
}

impl AreaBreakdown {
    /// Calcule le détail pour un extrait (vide si absent)
    pub fn of(extract: Option<&GeometryExtract>) -> Self {
        let Some(extract) = extract else {
            return Self::default();
        };

        let polylines: Vec<f64> = extract
            .polylines
            .iter()
            .enumerate()
            .map(|(idx, polyline)| {
                if polyline.vertices.len() < MIN_POLYLINE_VERTICES {
                    debug!(
                        index = idx,
                        vertices = polyline.vertices.len(),
                        "Skipping degenerate polyline"
                    );
                }
                polyline_area(polyline)
            })
            .collect();

        let polyline_total = polylines.iter().sum();
        let circle_total = extract.circles.iter().map(circle_area).sum();

        Self {
            polylines,
            polyline_total,
            circle_count: extract.circles.len(),
            circle_total,
        }
    }

    /// Surface totale (polylignes + cercles)
    pub fn total(&self) -> f64 {
        self.polyline_total + self.circle_total
    }
}

/// Surface totale d'un extrait, `0` si absent ou vide.
///
/// Les formes sont additionnées sans déduplication ni soustraction des
/// recouvrements.
pub fn compute_area(extract: Option<&GeometryExtract>) -> f64 {
    AreaBreakdown::of(extract).total()
}
