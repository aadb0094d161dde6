//! Rapport tableur (contenu tabulaire, indépendant du format de fichier)
//!
//! Trois feuilles:
//! - `Surfaces`: une ligne par polyligne et par extrait, un résumé des
//!   cercles par extrait, puis les totaux (identiques au résultat de comparaison)
//! - `SDP`: surfaces par destination, d'après les calques `GEX_EDS_SDP_1-<CODE>`
//! - `TA`: en-têtes et étage, à compléter manuellement

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::area::ring_area;
use crate::compare::ComparisonResult;
use crate::report::{ReportInputs, Side};
use crate::types::Polyline;

pub const SHEET_SURFACES: &str = "Surfaces";
pub const SHEET_SDP: &str = "SDP";
pub const SHEET_TA: &str = "TA";

pub const TOTAL_PROJET: &str = "TOTAL PROJET";
pub const TOTAL_EXISTANT: &str = "TOTAL EXISTANT";
pub const TOTAL_DIFFERENCE: &str = "DIFFÉRENCE";

/// Calque des surfaces de plancher principales
const SDP_MAIN_LAYER: &str = "GEX_EDS_SDP_1";
const SDP_DESTINATION_PREFIX: &str = "GEX_EDS_SDP_1-";

/// Calques des surfaces à déduire de la polyligne principale qui les contient
const SDP_DEDUCTION_LAYERS: [&str; 5] = [
    "GEX_EDS_SDP_2",
    "GEX_EDS_SDP_3",
    "GEX_EDS_SDP_4",
    "GEX_EDS_SDP_5",
    "GEX_EDS_SDP_7",
];

/// Codes de destination connus et leur libellé
const DESTINATIONS: [(&str, &str); 21] = [
    ("AUTRE_BUREAU", "Autre bureau"),
    ("AUTRE_CONGRE", "Autre congrès exposition"),
    ("AUTRE_ENTREP", "Autre entrepôt"),
    ("AUTRE_INDUST", "Autre industrie"),
    ("COMMERCE_ART", "Commerce artisanat"),
    ("COMMERCE_AUT", "Commerce autre hébergement touristique"),
    ("COMMERCE_CIN", "Commerce cinéma"),
    ("COMMERCE_DE_", "Commerce de gros"),
    ("COMMERCE_HOT", "Commerce hôtel"),
    ("COMMERCE_RES", "Commerce restauration"),
    ("COMMERCE_SER", "Commerce service accueil clientèle"),
    ("EXPLOITATIO", "Exploitation forestière"),
    ("EXPLOITATION", "Exploitation agricole"),
    ("HABITATION_H", "Habitation hébergement"),
    ("HABITATION_L", "Habitation logement"),
    ("SPIC_ADMINIS", "Spic administration"),
    ("SPIC_ART_SPE", "Spic art spectacle"),
    ("SPIC_AUTRE", "Spic autre"),
    ("SPIC_ENSEIGN", "Spic enseignement santé"),
    ("SPIC_LT", "Spic lt"),
    ("SPIC_SPORT", "Spic sport"),
];

/// Cellule du tableur
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Feuille: la première ligne est l'en-tête
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    fn with_header(name: &str, header: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            rows: vec![header.iter().map(|h| Cell::text(*h)).collect()],
        }
    }

    /// Première ligne dont une cellule texte vaut `label`
    pub fn find_row(&self, label: &str) -> Option<&[Cell]> {
        self.rows
            .iter()
            .find(|row| row.iter().any(|c| c.as_text() == Some(label)))
            .map(Vec::as_slice)
    }
}

/// Classeur complet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

/// Construit le contenu du tableur de comparaison
pub fn build_spreadsheet(comparison: &ComparisonResult, inputs: &ReportInputs<'_>) -> Workbook {
    Workbook {
        sheets: vec![
            surfaces_sheet(comparison, inputs),
            sdp_sheet(comparison, inputs),
            ta_sheet(comparison),
        ],
    }
}

fn surfaces_sheet(comparison: &ComparisonResult, inputs: &ReportInputs<'_>) -> Sheet {
    let floor = comparison.floor_name();
    let mut sheet = Sheet::with_header(
        SHEET_SURFACES,
        &["Étage", "Source", "Élément", "N°", "Calque", "Nombre", "Surface (m²)"],
    );

    for side in [Side::Projet, Side::Existant] {
        let Some(extract) = inputs.side(side) else {
            continue;
        };
        let breakdown = inputs.breakdown(side);

        for (idx, (polyline, area)) in extract.polylines.iter().zip(&breakdown.polylines).enumerate() {
            sheet.rows.push(vec![
                Cell::text(floor),
                Cell::text(side.label()),
                Cell::text("Polyligne"),
                Cell::Number((idx + 1) as f64),
                Cell::text(polyline.layer_name()),
                Cell::Number(polyline.vertices.len() as f64),
                Cell::Number(*area),
            ]);
        }

        sheet.rows.push(vec![
            Cell::text(floor),
            Cell::text(side.label()),
            Cell::text("Cercles"),
            Cell::Empty,
            Cell::Empty,
            Cell::Number(breakdown.circle_count as f64),
            Cell::Number(breakdown.circle_total),
        ]);
    }

    for (label, value) in [
        (TOTAL_PROJET, comparison.surface_projet()),
        (TOTAL_EXISTANT, comparison.surface_existant()),
        (TOTAL_DIFFERENCE, comparison.difference()),
    ] {
        sheet.rows.push(vec![
            Cell::text(floor),
            Cell::text("Total"),
            Cell::text(label),
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            Cell::Number(value),
        ]);
    }

    sheet
}

/// Code de destination porté par un calque `GEX_EDS_SDP_1-<CODE>`.
///
/// Un suffixe absent de la table des destinations est renvoyé tel quel.
pub fn destination_code(layer: &str) -> Option<&str> {
    if !layer.contains(SDP_MAIN_LAYER) {
        return None;
    }

    let raw = layer.split(SDP_DESTINATION_PREFIX).nth(1)?;
    let raw = raw.strip_suffix('_').unwrap_or(raw);
    let raw = if raw.contains("EXPLOITATIO0") {
        "EXPLOITATIO"
    } else {
        raw
    };
    if raw.is_empty() {
        return None;
    }

    DESTINATIONS
        .iter()
        .find(|(code, _)| *code == raw)
        .or_else(|| {
            DESTINATIONS
                .iter()
                .find(|(code, _)| raw.contains(code) || code.contains(raw))
        })
        .map(|(code, _)| *code)
        .or_else(|| {
            debug!(layer = layer, destination = raw, "Unknown SDP destination, keeping suffix");
            Some(raw)
        })
}

/// Libellé d'un code de destination
pub fn destination_label(code: &str) -> &str {
    DESTINATIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
        .unwrap_or(code)
}

fn is_deduction_layer(layer: &str) -> bool {
    SDP_DEDUCTION_LAYERS.iter().any(|p| layer.contains(p))
}

/// Au moins la moitié des sommets de `inner` dans la boîte englobante de `outer`
fn is_contained(inner: &Polyline, outer: &Polyline) -> bool {
    if inner.vertices.is_empty() {
        return false;
    }
    let Some(rect) = outer.bounding_rect() else {
        return false;
    };

    let (min, max) = (rect.min(), rect.max());
    let inside = inner
        .vertices
        .iter()
        .filter(|v| min.x <= v.x && v.x <= max.x && min.y <= v.y && v.y <= max.y)
        .count();

    inside as f64 >= inner.vertices.len() as f64 / 2.0
}

/// Surfaces par destination pour une liste de polylignes.
///
/// Chaque contour est refermé ([`ring_area`]). Les polylignes des calques de
/// déduction sont retranchées de la première polyligne principale qui les
/// contient.
pub fn destination_areas(polylines: &[Polyline]) -> BTreeMap<&str, f64> {
    let mut areas: BTreeMap<&str, f64> = BTreeMap::new();
    let mut mains: Vec<(&Polyline, &str)> = Vec::new();
    let mut deductions: Vec<&Polyline> = Vec::new();

    for polyline in polylines {
        let layer = polyline.layer_name();
        if layer.contains(SDP_MAIN_LAYER) {
            if let Some(code) = destination_code(layer) {
                *areas.entry(code).or_insert(0.0) += ring_area(polyline);
                mains.push((polyline, code));
            }
        } else if is_deduction_layer(layer) {
            deductions.push(polyline);
        }
    }

    for deduction in deductions {
        let area = ring_area(deduction);
        if area <= 0.0 {
            continue;
        }
        if let Some((_, code)) = mains.iter().find(|(main, _)| is_contained(deduction, main)) {
            if let Some(total) = areas.get_mut(code) {
                *total -= area;
                debug!(destination = code, deducted = area, "SDP deduction");
            }
        }
    }

    areas
}

fn sdp_sheet(comparison: &ComparisonResult, inputs: &ReportInputs<'_>) -> Sheet {
    let mut sheet = Sheet::with_header(
        SHEET_SDP,
        &[
            "Etages",
            "Destinations",
            "Surface existante avant travaux (A)",
            "Surface creee (B)",
            "Surface creee par changement de destination",
            "Surface demolie reconstruite",
            "Surface supprimee (D)",
            "Surface supprimee par changement de destination",
            "Surface projet",
            "Surface RDV",
        ],
    );

    let polylines_of = |side: Side| {
        inputs
            .side(side)
            .map(|e| e.polylines.as_slice())
            .unwrap_or(&[])
    };
    let existant = destination_areas(polylines_of(Side::Existant));
    let projet = destination_areas(polylines_of(Side::Projet));

    let mut codes: Vec<&str> = existant.keys().chain(projet.keys()).copied().collect();
    codes.sort_unstable();
    codes.dedup();

    let positive = |v: Option<&f64>| match v {
        Some(&v) if v > 0.0 => Cell::Number(v),
        _ => Cell::Empty,
    };

    if codes.is_empty() {
        let mut row = vec![Cell::text(comparison.floor_name())];
        row.resize(10, Cell::Empty);
        sheet.rows.push(row);
    }

    for (idx, code) in codes.into_iter().enumerate() {
        let floor = if idx == 0 {
            Cell::text(comparison.floor_name())
        } else {
            Cell::Empty
        };
        sheet.rows.push(vec![
            floor,
            Cell::text(destination_label(code)),
            positive(existant.get(code)),
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            positive(projet.get(code)),
            Cell::Empty,
        ]);
    }

    sheet
}

fn ta_sheet(comparison: &ComparisonResult) -> Sheet {
    let mut sheet = Sheet::with_header(
        SHEET_TA,
        &[
            "Etages",
            "Destinations",
            "TA existant",
            "TA creee",
            "TA demolie reconstruite",
            "TA Supprimee",
            "TA projet",
            "TA pour Stationnement",
        ],
    );
    sheet.rows.push(vec![Cell::text(comparison.floor_name())]);
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::compare;
    use crate::types::{Circle, GeometryExtract};
    use chrono::{TimeZone, Utc};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polyline {
        // Contour fermé explicitement: la formule donne l'aire exacte
        Polyline::from_points(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)])
    }

    fn build(projet: Option<&GeometryExtract>, existant: Option<&GeometryExtract>) -> (ComparisonResult, Workbook) {
        let ts = Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap();
        let comparison = compare(projet, existant, "R+1", None, ts).unwrap();
        let workbook = build_spreadsheet(&comparison, &ReportInputs::new(projet, existant));
        (comparison, workbook)
    }

    #[test]
    fn test_sheet_names() {
        let projet = GeometryExtract::default();
        let (_, workbook) = build(Some(&projet), None);
        let names: Vec<&str> = workbook.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![SHEET_SURFACES, SHEET_SDP, SHEET_TA]);
    }

    #[test]
    fn test_rows_per_polyline_and_circle_summary() {
        let projet = GeometryExtract {
            polylines: vec![rect(0.0, 0.0, 2.0, 3.0).with_layer("A"), rect(0.0, 0.0, 1.0, 1.0)],
            circles: vec![Circle::with_radius(1.0), Circle::with_radius(2.0)],
            ..Default::default()
        };
        let existant = GeometryExtract {
            polylines: vec![rect(0.0, 0.0, 4.0, 4.0)],
            ..Default::default()
        };
        let (_, workbook) = build(Some(&projet), Some(&existant));
        let sheet = workbook.sheet(SHEET_SURFACES).unwrap();

        // en-tête + 2 polylignes projet + cercles projet + 1 polyligne existant + cercles existant + 3 totaux
        assert_eq!(sheet.rows.len(), 1 + 2 + 1 + 1 + 1 + 3);

        let first = &sheet.rows[1];
        assert_eq!(first[1].as_text(), Some("Projet"));
        assert_eq!(first[4].as_text(), Some("A"));
        assert_eq!(first[6].as_number(), Some(6.0));

        let circles = &sheet.rows[3];
        assert_eq!(circles[2].as_text(), Some("Cercles"));
        assert_eq!(circles[5].as_number(), Some(2.0));
        assert!((circles[6].as_number().unwrap() - 5.0 * std::f64::consts::PI).abs() < 1e-9);

        let existant_row = &sheet.rows[4];
        assert_eq!(existant_row[1].as_text(), Some("Existant"));
        assert_eq!(existant_row[6].as_number(), Some(16.0));
    }

    #[test]
    fn test_totals_match_comparison_exactly() {
        let projet = GeometryExtract {
            polylines: vec![
                Polyline::from_points(&[(0.1, 0.3), (7.7, 0.2), (7.9, 5.3), (0.3, 5.1)]),
                Polyline::from_points(&[(1.25, 1.5), (3.75, 1.33), (2.2, 4.1)]),
            ],
            circles: vec![Circle::with_radius(0.7)],
            ..Default::default()
        };
        let existant = GeometryExtract {
            polylines: vec![Polyline::from_points(&[(0.0, 0.0), (3.3, 0.0), (3.3, 2.9), (0.0, 2.9)])],
            ..Default::default()
        };
        let (comparison, workbook) = build(Some(&projet), Some(&existant));
        let sheet = workbook.sheet(SHEET_SURFACES).unwrap();

        let total = |label: &str| sheet.find_row(label).and_then(|r| r[6].as_number()).unwrap();
        assert_eq!(total(TOTAL_PROJET), comparison.surface_projet());
        assert_eq!(total(TOTAL_EXISTANT), comparison.surface_existant());
        assert_eq!(total(TOTAL_DIFFERENCE), comparison.difference());
    }

    #[test]
    fn test_destination_code_matching() {
        assert_eq!(destination_code("GEX_EDS_SDP_1-HABITATION_L"), Some("HABITATION_L"));
        assert_eq!(destination_code("GEX_EDS_SDP_1-HABITATION_L_"), Some("HABITATION_L"));
        assert_eq!(destination_code("GEX_EDS_SDP_1-EXPLOITATIO0"), Some("EXPLOITATIO"));
        assert_eq!(destination_code("GEX_EDS_SDP_1-EXPLOITATION"), Some("EXPLOITATION"));
        // Correspondance partielle
        assert_eq!(destination_code("GEX_EDS_SDP_1-SPIC_SPORT_2"), Some("SPIC_SPORT"));
        assert_eq!(destination_code("GEX_EDS_SDP_1-PARKING"), Some("PARKING"));
        assert_eq!(destination_code("GEX_EDS_SDP_1-"), None);
        assert_eq!(destination_code("GEX_EDS_SDP_1"), None);
        assert_eq!(destination_code("MURS"), None);
        assert_eq!(destination_label("COMMERCE_HOT"), "Commerce hôtel");
        assert_eq!(destination_label("INCONNU"), "INCONNU");
    }

    #[test]
    fn test_destination_areas_with_deduction() {
        let polylines = vec![
            rect(0.0, 0.0, 10.0, 10.0).with_layer("GEX_EDS_SDP_1-HABITATION_L"),
            rect(20.0, 0.0, 25.0, 4.0).with_layer("GEX_EDS_SDP_1-COMMERCE_HOT"),
            // Trémie dans le logement
            rect(2.0, 2.0, 4.0, 4.0).with_layer("GEX_EDS_SDP_3"),
            // Déduction hors de toute surface principale
            rect(100.0, 100.0, 101.0, 101.0).with_layer("GEX_EDS_SDP_2"),
            rect(0.0, 0.0, 1.0, 1.0).with_layer("MURS"),
        ];
        let areas = destination_areas(&polylines);
        assert_eq!(areas.len(), 2);
        assert_eq!(areas["HABITATION_L"], 96.0);
        assert_eq!(areas["COMMERCE_HOT"], 20.0);
    }

    #[test]
    fn test_destination_areas_close_open_rings() {
        // Contour non refermé, hors de l'origine
        let polylines = vec![
            Polyline::from_points(&[(1.0, 1.0), (1.0, 11.0), (11.0, 11.0), (11.0, 1.0)])
                .with_layer("GEX_EDS_SDP_1-HABITATION_L"),
            Polyline::from_points(&[(3.0, 3.0), (5.0, 3.0), (5.0, 5.0), (3.0, 5.0)])
                .with_layer("GEX_EDS_SDP_4"),
        ];
        let areas = destination_areas(&polylines);
        assert_eq!(areas["HABITATION_L"], 96.0);
    }

    #[test]
    fn test_unknown_destination_keeps_its_row() {
        let projet = GeometryExtract {
            polylines: vec![rect(0.0, 0.0, 10.0, 10.0).with_layer("GEX_EDS_SDP_1-PARKING")],
            ..Default::default()
        };
        let areas = destination_areas(&projet.polylines);
        assert_eq!(areas["PARKING"], 100.0);

        let (_, workbook) = build(Some(&projet), None);
        let parking = workbook.sheet(SHEET_SDP).unwrap().find_row("PARKING").unwrap();
        assert_eq!(parking[8].as_number(), Some(100.0));
    }

    #[test]
    fn test_sdp_sheet_rows() {
        let projet = GeometryExtract {
            polylines: vec![rect(0.0, 0.0, 10.0, 10.0).with_layer("GEX_EDS_SDP_1-HABITATION_L")],
            ..Default::default()
        };
        let existant = GeometryExtract {
            polylines: vec![
                rect(0.0, 0.0, 5.0, 5.0).with_layer("GEX_EDS_SDP_1-HABITATION_L"),
                rect(0.0, 0.0, 2.0, 2.0).with_layer("GEX_EDS_SDP_1-AUTRE_BUREAU"),
            ],
            ..Default::default()
        };
        let (_, workbook) = build(Some(&projet), Some(&existant));
        let sheet = workbook.sheet(SHEET_SDP).unwrap();

        assert_eq!(sheet.rows.len(), 3);
        let bureau = sheet.find_row("Autre bureau").unwrap();
        assert_eq!(bureau[0].as_text(), Some("R+1"));
        assert_eq!(bureau[2].as_number(), Some(4.0));
        assert_eq!(bureau[8], Cell::Empty);

        let logement = sheet.find_row("Habitation logement").unwrap();
        assert_eq!(logement[0], Cell::Empty);
        assert_eq!(logement[2].as_number(), Some(25.0));
        assert_eq!(logement[8].as_number(), Some(100.0));
    }

    #[test]
    fn test_sdp_sheet_without_destinations() {
        let (_, workbook) = build(Some(&GeometryExtract::default()), None);
        let sheet = workbook.sheet(SHEET_SDP).unwrap();
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1][0].as_text(), Some("R+1"));
        assert_eq!(sheet.rows[1].len(), 10);
    }

    #[test]
    fn test_ta_sheet() {
        let (_, workbook) = build(Some(&GeometryExtract::default()), None);
        let sheet = workbook.sheet(SHEET_TA).unwrap();
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].len(), 8);
        assert_eq!(sheet.rows[1], vec![Cell::text("R+1")]);
    }
}
