//! Rapport visa au format texte
//!
//! Les lignes de résumé (`Surface PROJET:`, `Surface EXISTANT:`,
//! `DIFFÉRENCE:`) portent chacune un nombre à 2 décimales suivi de `m²`.
//! [`VisaSummary::parse`] les relit ligne à ligne.

use std::fmt::Write;

use tracing::warn;

use crate::compare::{ComparisonResult, Impact};
use crate::report::{ElementCounts, ReportInputs, Side};

const WIDE_RULE: usize = 80;
const NARROW_RULE: usize = 50;

const LABEL_PROJET: &str = "Surface PROJET:";
const LABEL_EXISTANT: &str = "Surface EXISTANT:";
const LABEL_DIFFERENCE: &str = "DIFFÉRENCE:";
const LABEL_FLOOR: &str = "Étage/Niveau:";
const LABEL_TIMESTAMP: &str = "Horodatage:";

/// Construit le contenu du fichier visa
pub fn build_visa_text(comparison: &ComparisonResult, inputs: &ReportInputs<'_>) -> String {
    let mut out = String::new();
    if let Err(e) = write_visa(&mut out, comparison, inputs) {
        warn!(error = %e, "Visa text formatting failed");
    }
    out
}

fn write_visa(
    out: &mut String,
    comparison: &ComparisonResult,
    inputs: &ReportInputs<'_>,
) -> std::fmt::Result {
    let floor = comparison.floor_name();
    let ts = comparison.timestamp();
    let projet = comparison.surface_projet();
    let existant = comparison.surface_existant();
    let difference = comparison.difference();
    let percent = comparison.percent_of_existant();
    let projet_counts = inputs.counts(Side::Projet);
    let existant_counts = inputs.counts(Side::Existant);

    writeln!(out, "{}", "=".repeat(WIDE_RULE))?;
    writeln!(out, "RAPPORT DÉTAILLÉ DE CALCUL DE SURFACE - {floor}")?;
    writeln!(out, "{}", "=".repeat(WIDE_RULE))?;
    writeln!(out, "Date de génération: {}", ts.format("%d/%m/%Y %H:%M:%S"))?;
    writeln!(out, "{LABEL_TIMESTAMP} {}", ts.to_rfc3339())?;
    writeln!(out, "{LABEL_FLOOR} {floor}")?;
    writeln!(out)?;

    section(out, "RÉSUMÉ DES SURFACES:")?;
    writeln!(out, "{LABEL_PROJET}\t\t{projet:.2} m²")?;
    writeln!(out, "{LABEL_EXISTANT}\t{existant:.2} m²")?;
    match percent {
        Some(p) => writeln!(
            out,
            "{LABEL_DIFFERENCE}\t\t{difference:.2} m² ({}{p:.2}% par rapport à l'existant)",
            if difference > 0.0 { "+" } else { "" }
        )?,
        None => writeln!(out, "{LABEL_DIFFERENCE}\t\t{difference:.2} m²")?,
    }
    writeln!(out, "IMPACT:\t\t\t{}", comparison.impact().label())?;

    if let Some(c) = projet_counts.filter(|c| projet > 0.0 && c.polylines > 0) {
        writeln!(out, "DENSITÉ PROJET:\t{:.2} m²/élément", projet / c.polylines as f64)?;
    }
    if let Some(c) = existant_counts.filter(|c| existant > 0.0 && c.polylines > 0) {
        writeln!(out, "DENSITÉ EXISTANT:\t{:.2} m²/élément", existant / c.polylines as f64)?;
    }
    writeln!(out)?;

    section(out, "ANALYSE COMPARATIVE DÉTAILLÉE:")?;
    write_analysis(out, comparison, projet_counts, existant_counts)?;
    writeln!(out)?;

    section(out, "INVENTAIRE DÉTAILLÉ DES ÉLÉMENTS:")?;
    write_inventory(out, Side::Projet, projet, projet_counts)?;
    write_inventory(out, Side::Existant, existant, existant_counts)?;
    if let (Some(p), Some(e)) = (projet_counts, existant_counts) {
        let poly_diff = p.polylines as i64 - e.polylines as i64;
        let circle_diff = p.circles as i64 - e.circles as i64;
        writeln!(out, "\nCOMPARAISON DES ÉLÉMENTS:")?;
        writeln!(out, "  - Différence en polylignes: {}", signed(poly_diff))?;
        writeln!(out, "  - Différence en cercles: {}", signed(circle_diff))?;
        writeln!(out, "  - Différence totale d'éléments: {}", signed(poly_diff + circle_diff))?;
    }
    writeln!(out)?;

    section(out, "DÉTAIL PAR POLYLIGNE:")?;
    write_polyline_detail(out, inputs, Side::Projet)?;
    write_polyline_detail(out, inputs, Side::Existant)?;
    writeln!(out)?;

    section(out, "COMMENTAIRES ET OBSERVATIONS:")?;
    write_observations(out, comparison, projet_counts, existant_counts)?;
    writeln!(out)?;

    section(out, "RECOMMANDATIONS TECHNIQUES:")?;
    writeln!(out, "- Vérification de la cohérence des surfaces avec les autres documents du projet")?;
    writeln!(out, "- Confirmation des calculs avec les surfaces mentionnées dans les dossiers administratifs")?;
    writeln!(out, "- Évaluation de l'impact des modifications sur les performances énergétiques du bâtiment")?;
    writeln!(out, "- Analyse des implications sur les évacuations et issues de secours (si applicable)")?;
    writeln!(out)?;

    writeln!(out, "{}", "=".repeat(WIDE_RULE))?;
    section(out, "INFORMATIONS LÉGALES:")?;
    writeln!(
        out,
        "Ce rapport a été généré automatiquement le {} à {}",
        ts.format("%d/%m/%Y"),
        ts.format("%H:%M:%S")
    )?;
    writeln!(out, "Les calculs sont effectués sur la base des éléments fournis dans les fichiers DXF.")?;
    writeln!(out, "Ces résultats doivent être vérifiés par un professionnel qualifié.")?;
    Ok(())
}

fn section(out: &mut String, title: &str) -> std::fmt::Result {
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "-".repeat(NARROW_RULE))
}

fn signed(value: i64) -> String {
    if value > 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

fn element_total(counts: Option<ElementCounts>) -> usize {
    counts.map(|c| c.total()).unwrap_or(0)
}

fn write_analysis(
    out: &mut String,
    comparison: &ComparisonResult,
    projet_counts: Option<ElementCounts>,
    existant_counts: Option<ElementCounts>,
) -> std::fmt::Result {
    let projet = comparison.surface_projet();
    let existant = comparison.surface_existant();
    let difference = comparison.difference();
    let proj_elems = element_total(projet_counts);
    let exist_elems = element_total(existant_counts);

    if projet > 0.0 && existant > 0.0 {
        let percent = comparison.percent_of_existant().unwrap_or(0.0);
        match comparison.impact() {
            Impact::Agrandissement => {
                writeln!(out, "Détails de l'agrandissement: {difference:.2} m² ajoutés par rapport à l'existant")?;
                writeln!(out, "Ratio surface projet/existant: {:.2}", projet / existant)?;
                writeln!(out, "Pourcentage d'augmentation: {percent:.2}%")?;
                if proj_elems > exist_elems {
                    writeln!(
                        out,
                        "Surface moyenne ajoutée par nouvel élément: {:.2} m²",
                        difference / (proj_elems - exist_elems) as f64
                    )?;
                }
            }
            Impact::Reduction => {
                writeln!(out, "Détails de la réduction: {:.2} m² supprimés par rapport à l'existant", difference.abs())?;
                writeln!(out, "Ratio surface projet/existant: {:.2}", projet / existant)?;
                writeln!(out, "Pourcentage de diminution: {:.2}%", percent.abs())?;
                if exist_elems > proj_elems {
                    writeln!(
                        out,
                        "Surface moyenne réduite par élément supprimé: {:.2} m²",
                        difference.abs() / (exist_elems - proj_elems) as f64
                    )?;
                }
            }
            Impact::Inchange => {
                writeln!(out, "Les surfaces projet et existant sont identiques")?;
                writeln!(out, "Aucune modification significative de la surface globale")?;
                if proj_elems != exist_elems {
                    writeln!(
                        out,
                        "Bien que la surface totale soit identique, le nombre d'éléments a changé: {} éléments",
                        signed(proj_elems as i64 - exist_elems as i64)
                    )?;
                }
            }
        }
    } else if projet > 0.0 {
        writeln!(out, "Nouvelle construction: {projet:.2} m² sans existant précédent")?;
        if proj_elems > 0 {
            writeln!(out, "Surface moyenne par élément: {:.2} m²", projet / proj_elems as f64)?;
        }
    } else if existant > 0.0 {
        writeln!(out, "Démolition complète: {existant:.2} m² de surface existante")?;
        if exist_elems > 0 {
            writeln!(out, "Surface moyenne par élément supprimé: {:.2} m²", existant / exist_elems as f64)?;
        }
    }
    Ok(())
}

fn write_inventory(
    out: &mut String,
    side: Side,
    surface: f64,
    counts: Option<ElementCounts>,
) -> std::fmt::Result {
    let Some(c) = counts else {
        return Ok(());
    };

    // Le bloc existant est toujours précédé d'une ligne vide
    if side == Side::Existant {
        writeln!(out)?;
    }
    writeln!(out, "{}:", side.upper())?;
    writeln!(out, "  - Nombre total de polylignes: {}", c.polylines)?;
    writeln!(out, "  - Nombre total de cercles: {}", c.circles)?;
    writeln!(out, "  - Nombre total d'éléments: {}", c.total())?;
    if c.polylines > 0 {
        writeln!(
            out,
            "  - Surface moyenne par polyligne: {:.2} m² (si répartition uniforme)",
            surface / c.polylines as f64
        )?;
    }
    writeln!(out, "  - Types d'éléments: Polylignes fermées (surfaces), cercles")?;
    if c.polylines > 0 && c.circles > 0 {
        writeln!(
            out,
            "  - Ratio polylignes/cercles: {:.2}",
            c.polylines as f64 / c.circles as f64
        )?;
    }
    Ok(())
}

fn write_polyline_detail(
    out: &mut String,
    inputs: &ReportInputs<'_>,
    side: Side,
) -> std::fmt::Result {
    let Some(extract) = inputs.side(side) else {
        return Ok(());
    };
    let breakdown = inputs.breakdown(side);

    for (idx, (polyline, area)) in extract.polylines.iter().zip(&breakdown.polylines).enumerate() {
        let layer = match polyline.layer_name() {
            "" => "-",
            name => name,
        };
        writeln!(
            out,
            "{} #{}\tcalque={}\tsommets={}\tsurface={:.2} m²",
            side.upper(),
            idx + 1,
            layer,
            polyline.vertices.len(),
            area
        )?;
    }
    writeln!(
        out,
        "{} cercles\tnombre={}\tsurface={:.2} m²",
        side.upper(),
        breakdown.circle_count,
        breakdown.circle_total
    )
}

fn write_observations(
    out: &mut String,
    comparison: &ComparisonResult,
    projet_counts: Option<ElementCounts>,
    existant_counts: Option<ElementCounts>,
) -> std::fmt::Result {
    let difference = comparison.difference();
    let percent = comparison.percent_of_existant();
    let percent_note = |p: Option<f64>| match p {
        Some(p) => format!(" ({:.2}% par rapport à l'existant)", p.abs()),
        None => String::new(),
    };

    match comparison.impact() {
        Impact::Agrandissement => {
            writeln!(
                out,
                "- Ce calcul montre une augmentation de surface de {difference:.2} m²{}.",
                percent_note(percent)
            )?;
            writeln!(out, "- Veuillez vérifier que cette augmentation est conforme aux règles d'urbanisme et aux limites de constructibilité.")?;
            writeln!(out, "- Vérification recommandée: coefficient d'emprise au sol (CES) et coefficient d'occupation des sols (COS) du PLU.")?;
            writeln!(out, "- Points d'attention:")?;
            writeln!(out, "  * Vérifier les calculs des droits à construire dans le cas d'une extension")?;
            writeln!(out, "  * Contrôler la conformité avec les règles de constructibilité locales")?;
            writeln!(out, "  * Confirmer la compatibilité avec les règles de gabarit et de prospect")?;
            if let Some(p) = percent.filter(|p| *p > 20.0) {
                writeln!(out, "- ATTENTION: L'augmentation de surface de {p:.2}% est significative et peut nécessiter ")?;
                writeln!(out, "  des autorisations d'urbanisme spécifiques (permis de construire plutôt qu'une déclaration préalable).")?;
            }
        }
        Impact::Reduction => {
            writeln!(
                out,
                "- Ce calcul montre une diminution de surface de {:.2} m²{}.",
                difference.abs(),
                percent_note(percent)
            )?;
            writeln!(out, "- Assurez-vous que cette réduction est voulue et qu'elle respecte les objectifs du projet.")?;
            writeln!(out, "- Points d'attention:")?;
            writeln!(out, "  * Vérifier l'impact sur le fonctionnement des espaces")?;
            writeln!(out, "  * Contrôler la conformité des nouveaux espaces avec les normes d'accessibilité")?;
            writeln!(out, "  * Évaluer l'impact sur les calculs réglementaires (surface utile, surface taxable)")?;
            if let Some(p) = percent.map(f64::abs).filter(|p| *p > 30.0) {
                writeln!(out, "- NOTE: La réduction importante de {p:.2}% peut indiquer une restructuration majeure")?;
                writeln!(out, "  du bâtiment. Vérifiez l'exactitude des fichiers DXF et des éléments pris en compte.")?;
            }
        }
        Impact::Inchange => {
            writeln!(out, "- Les surfaces projet et existant sont identiques.")?;
            writeln!(out, "- Aucun impact sur la surface totale.")?;
            if element_total(projet_counts) != element_total(existant_counts) {
                writeln!(out, "- Bien que la surface totale soit inchangée, la répartition des espaces a été modifiée")?;
                writeln!(out, "  (nombre d'éléments différent entre projet et existant).")?;
                writeln!(out, "- Vérifier que cette redistribution respecte les exigences fonctionnelles du bâtiment.")?;
            } else {
                writeln!(out, "- La structure du bâtiment semble inchangée (même nombre d'éléments).")?;
                writeln!(out, "- Il peut s'agir d'une mise à jour du fichier sans modification structurelle.")?;
            }
        }
    }
    Ok(())
}

/// Résumé relu depuis un fichier visa
#[derive(Debug, Clone, PartialEq)]
pub struct VisaSummary {
    pub floor_name: String,
    pub timestamp: String,
    pub surface_projet: f64,
    pub surface_existant: f64,
    pub difference: f64,
}

impl VisaSummary {
    /// Relit l'en-tête et les trois surfaces d'un contenu visa.
    ///
    /// Retourne `None` si une des lignes attendues manque.
    pub fn parse(content: &str) -> Option<Self> {
        let mut floor_name = None;
        let mut timestamp = None;
        let mut projet = None;
        let mut existant = None;
        let mut difference = None;

        for line in content.lines() {
            if let Some(rest) = line.strip_prefix(LABEL_FLOOR) {
                floor_name.get_or_insert_with(|| rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix(LABEL_TIMESTAMP) {
                timestamp.get_or_insert_with(|| rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix(LABEL_PROJET) {
                projet = projet.or_else(|| first_number(rest));
            } else if let Some(rest) = line.strip_prefix(LABEL_EXISTANT) {
                existant = existant.or_else(|| first_number(rest));
            } else if let Some(rest) = line.strip_prefix(LABEL_DIFFERENCE) {
                difference = difference.or_else(|| first_number(rest));
            }
        }

        Some(Self {
            floor_name: floor_name?,
            timestamp: timestamp?,
            surface_projet: projet?,
            surface_existant: existant?,
            difference: difference?,
        })
    }
}

fn first_number(rest: &str) -> Option<f64> {
    rest.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::compare;
    use crate::types::{Circle, GeometryExtract, Polyline};
    use chrono::{TimeZone, Utc};

    fn square(side: f64) -> Polyline {
        Polyline::from_points(&[(0.0, 0.0), (0.0, side), (side, side), (side, 0.0)])
    }

    fn render(projet: Option<&GeometryExtract>, existant: Option<&GeometryExtract>) -> (ComparisonResult, String) {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 14, 5, 9).unwrap();
        let comparison = compare(projet, existant, "Etage 1", None, ts).unwrap();
        let text = build_visa_text(&comparison, &ReportInputs::new(projet, existant));
        (comparison, text)
    }

    #[test]
    fn test_header_and_summary() {
        let projet = GeometryExtract {
            polylines: vec![square(12.0).with_layer("GEX_EDS_SDP_1-HABITATION_L")],
            ..Default::default()
        };
        let existant = GeometryExtract {
            polylines: vec![square(10.0)],
            ..Default::default()
        };
        let (_, text) = render(Some(&projet), Some(&existant));

        assert!(text.contains("RAPPORT DÉTAILLÉ DE CALCUL DE SURFACE - Etage 1"));
        assert!(text.contains("Date de génération: 01/06/2025 14:05:09"));
        assert!(text.contains("Surface PROJET:\t\t144.00 m²"));
        assert!(text.contains("Surface EXISTANT:\t100.00 m²"));
        assert!(text.contains("DIFFÉRENCE:\t\t44.00 m² (+44.00% par rapport à l'existant)"));
        assert!(text.contains("IMPACT:\t\t\tAgrandissement"));
        assert!(text.contains("- ATTENTION: L'augmentation de surface de 44.00%"));
    }

    #[test]
    fn test_polyline_breakdown_lines() {
        let projet = GeometryExtract {
            polylines: vec![
                square(2.0).with_layer("MURS"),
                Polyline::from_points(&[(0.0, 0.0), (1.0, 1.0)]),
            ],
            circles: vec![Circle::with_radius(1.0)],
            ..Default::default()
        };
        let (_, text) = render(Some(&projet), None);

        assert!(text.contains("PROJET #1\tcalque=MURS\tsommets=4\tsurface=4.00 m²"));
        assert!(text.contains("PROJET #2\tcalque=-\tsommets=2\tsurface=0.00 m²"));
        assert!(text.contains("PROJET cercles\tnombre=1\tsurface=3.14 m²"));
        assert!(!text.contains("EXISTANT #"));
        assert!(text.contains("Nouvelle construction: 7.14 m² sans existant précédent"));
    }

    #[test]
    fn test_demolition_and_reduction() {
        let existant = GeometryExtract {
            polylines: vec![square(10.0)],
            ..Default::default()
        };
        let (_, text) = render(None, Some(&existant));
        assert!(text.contains("Démolition complète: 100.00 m² de surface existante"));
        assert!(text.contains("IMPACT:\t\t\tRéduction"));
        assert!(text.contains("\n\nEXISTANT:\n  - Nombre total de polylignes: 1"));
        assert!(text.contains("- NOTE: La réduction importante de 100.00%"));
    }

    #[test]
    fn test_unchanged_surface() {
        let projet = GeometryExtract {
            polylines: vec![square(5.0)],
            ..Default::default()
        };
        let (_, text) = render(Some(&projet), Some(&projet.clone()));
        assert!(text.contains("Les surfaces projet et existant sont identiques"));
        assert!(text.contains("- La structure du bâtiment semble inchangée"));
        assert!(text.contains("  - Différence totale d'éléments: 0"));
    }

    #[test]
    fn test_summary_parses_back() {
        let projet = GeometryExtract {
            polylines: vec![square(7.0)],
            circles: vec![Circle::with_radius(2.0)],
            ..Default::default()
        };
        let existant = GeometryExtract {
            polylines: vec![square(3.0)],
            ..Default::default()
        };
        let (comparison, text) = render(Some(&projet), Some(&existant));

        let summary = VisaSummary::parse(&text).unwrap();
        assert_eq!(summary.floor_name, "Etage 1");
        assert_eq!(summary.timestamp, comparison.timestamp().to_rfc3339());
        assert!((summary.surface_projet - comparison.surface_projet()).abs() < 0.005);
        assert!((summary.surface_existant - comparison.surface_existant()).abs() < 0.005);
        assert!((summary.difference - comparison.difference()).abs() < 0.005);
    }

    #[test]
    fn test_summary_parse_rejects_foreign_text() {
        assert!(VisaSummary::parse("hello\nworld").is_none());
    }
}
