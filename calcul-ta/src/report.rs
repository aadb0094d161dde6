//! Rapport d'exécution d'une soumission
//!
//! Résume le résultat de `compute`: surfaces, artefacts écrits (avec
//! empreinte) et erreurs par artefact. Affichable sur la console et
//! sauvegardable en JSON.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use surface_ta::report::SurfacesPayload;

use crate::dispatch::{DispatchError, DispatchState, PersistError, ReportArtifact, SubmitOutcome};
use crate::store::ArtifactKind;

/// Statut global de la soumission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmitStatus {
    /// Les deux artefacts sont écrits
    Success,
    /// Un seul artefact écrit
    PartialSuccess,
    /// Saisie refusée avant tout calcul de rapport
    Rejected,
    /// Aucun artefact écrit
    Failed,
}

/// État d'un artefact dans le rapport
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactEntry {
    pub kind: ArtifactKind,
    pub locator: Option<String>,
    pub checksum: Option<String>,
    pub error: Option<String>,
}

impl ArtifactEntry {
    fn from_result(kind: ArtifactKind, result: &std::result::Result<ReportArtifact, PersistError>) -> Self {
        match result {
            Ok(artifact) => Self {
                kind,
                locator: Some(artifact.locator.clone()),
                checksum: Some(artifact.checksum.clone()),
                error: None,
            },
            Err(e) => Self {
                kind,
                locator: None,
                checksum: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Rapport complet d'une soumission
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReport {
    pub floor_name: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub duration_secs: f64,
    pub status: SubmitStatus,
    pub state: DispatchState,

    pub surface_projet: Option<f64>,
    pub surface_existant: Option<f64>,
    pub difference: Option<f64>,
    pub folder: Option<String>,

    /// Détail envoyé au stockage (surfaces, compteurs, polylignes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surfaces: Option<SurfacesPayload>,

    pub artifacts: Vec<ArtifactEntry>,
    /// Motif du refus
    pub rejection: Option<String>,
}

impl SubmitReport {
    /// Rapport d'une soumission acceptée
    pub fn from_outcome(outcome: &SubmitOutcome, duration: Duration) -> Self {
        let artifacts = vec![
            ArtifactEntry::from_result(ArtifactKind::VisaText, &outcome.visa),
            ArtifactEntry::from_result(ArtifactKind::Spreadsheet, &outcome.spreadsheet),
        ];
        let written = artifacts.iter().filter(|a| a.is_ok()).count();
        let status = match written {
            2 => SubmitStatus::Success,
            0 => SubmitStatus::Failed,
            _ => SubmitStatus::PartialSuccess,
        };

        let comparison = &outcome.comparison;
        Self {
            floor_name: comparison.floor_name().to_string(),
            timestamp: Some(comparison.timestamp()),
            duration_secs: duration.as_secs_f64(),
            status,
            state: outcome.state,
            surface_projet: Some(comparison.surface_projet()),
            surface_existant: Some(comparison.surface_existant()),
            difference: Some(comparison.difference()),
            folder: outcome.folder.clone(),
            surfaces: Some(outcome.surfaces.clone()),
            artifacts,
            rejection: None,
        }
    }

    /// Rapport d'une soumission refusée
    pub fn from_error(floor_name: &str, error: &DispatchError, duration: Duration) -> Self {
        let status = match error {
            DispatchError::Rejected(_) => SubmitStatus::Rejected,
            DispatchError::Build(_) => SubmitStatus::Failed,
        };
        Self {
            floor_name: floor_name.to_string(),
            timestamp: None,
            duration_secs: duration.as_secs_f64(),
            status,
            state: error.state(),
            surface_projet: None,
            surface_existant: None,
            difference: None,
            folder: None,
            surfaces: None,
            artifacts: Vec::new(),
            rejection: Some(error.to_string()),
        }
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("SURFACE REPORT - {}", self.floor_name);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);
        if let Some(ts) = self.timestamp {
            println!("Timestamp: {}", ts.to_rfc3339());
        }

        if let Some(reason) = &self.rejection {
            println!("\n--- REJECTED ---");
            println!("  {}", reason);
            println!("\n{}", "=".repeat(60));
            return;
        }

        println!("\n--- SURFACES ---");
        if let (Some(p), Some(e), Some(d)) = (self.surface_projet, self.surface_existant, self.difference) {
            println!("  Projet:     {:>12.2} m²", p);
            println!("  Existant:   {:>12.2} m²", e);
            println!("  Difference: {:>+12.2} m²", d);
        }
        if let Some(folder) = &self.folder {
            println!("  Folder: {}", folder);
        }

        println!("\n--- ARTIFACTS ---");
        for a in &self.artifacts {
            match (&a.locator, &a.error) {
                (Some(locator), _) => println!(
                    "  {}: {} (blake3 {})",
                    a.kind.label(),
                    locator,
                    a.checksum.as_deref().map(|c| &c[..c.len().min(12)]).unwrap_or("-")
                ),
                (None, Some(error)) => println!("  {}: FAILED {}", a.kind.label(), error),
                (None, None) => println!("  {}: -", a.kind.label()),
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        match (&self.rejection, self.difference) {
            (Some(reason), _) => format!("{}: rejected ({})", self.floor_name, reason),
            (None, Some(difference)) => format!(
                "{}: {:+.2} m², {}/{} artifacts written",
                self.floor_name,
                difference,
                self.artifacts.iter().filter(|a| a.is_ok()).count(),
                self.artifacts.len()
            ),
            (None, None) => format!("{}: {:?}", self.floor_name, self.status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ArtifactContent;
    use chrono::TimeZone;
    use surface_ta::{compare, GeometryExtract, Polyline, ReportInputs, SurfaceError};

    fn outcome(spreadsheet: std::result::Result<ReportArtifact, PersistError>) -> SubmitOutcome {
        let projet = GeometryExtract {
            polylines: vec![Polyline::from_points(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)])],
            ..Default::default()
        };
        let ts = Utc.with_ymd_and_hms(2025, 5, 6, 7, 8, 9).unwrap();
        let comparison = compare(Some(&projet), None, "R+1", None, ts).unwrap();
        let surfaces = ReportInputs::new(Some(&projet), None).surfaces_payload(&comparison);
        let visa = Ok(ReportArtifact::new(
            ArtifactKind::VisaText,
            "Output/visa_R+1.txt".to_string(),
            ArtifactContent::Text("visa".to_string()),
        ));
        let state = if spreadsheet.is_ok() {
            DispatchState::Done
        } else {
            DispatchState::PersistFailed
        };
        SubmitOutcome {
            comparison,
            surfaces,
            folder: None,
            visa,
            spreadsheet,
            state,
        }
    }

    #[test]
    fn test_partial_success() {
        let report = SubmitReport::from_outcome(
            &outcome(Err(PersistError::Failed("disk full".to_string()))),
            Duration::from_millis(20),
        );
        assert_eq!(report.status, SubmitStatus::PartialSuccess);
        assert_eq!(report.state, DispatchState::PersistFailed);
        assert!(report.artifacts[0].is_ok());
        assert_eq!(report.artifacts[0].checksum.as_ref().map(String::len), Some(64));
        assert!(report.artifacts[1].error.as_deref().unwrap().contains("disk full"));
        assert!(report.summary().contains("1/2 artifacts"));
    }

    #[test]
    fn test_success() {
        let sheet = Ok(ReportArtifact::new(
            ArtifactKind::Spreadsheet,
            "Output/a.xlsx".to_string(),
            ArtifactContent::Text("x".to_string()),
        ));
        let report = SubmitReport::from_outcome(&outcome(sheet), Duration::ZERO);
        assert_eq!(report.status, SubmitStatus::Success);
        assert_eq!(report.surface_projet, Some(100.0));
        assert!(report.summary().contains("+100.00 m²"));
    }

    #[test]
    fn test_rejected() {
        let error = DispatchError::Rejected(SurfaceError::MissingInput);
        let report = SubmitReport::from_error("R+1", &error, Duration::ZERO);
        assert_eq!(report.status, SubmitStatus::Rejected);
        assert!(report.artifacts.is_empty());
        assert!(report.summary().contains("rejected"));
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = SubmitReport::from_outcome(
            &outcome(Err(PersistError::Timeout(Duration::from_secs(1)))),
            Duration::ZERO,
        );
        report.save_to_file(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["status"], "PartialSuccess");
        assert_eq!(json["surfaces"]["projet"]["surface"], 100.0);
        assert_eq!(json["artifacts"][0]["kind"], "VisaText");
    }
}
