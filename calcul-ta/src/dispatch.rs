//! Coordination d'une soumission: comparaison, construction des rapports,
//! écriture concurrente des deux artefacts.
//!
//! ```text
//! Idle -> Comparing -> ThresholdRejected
//!                   -> Building -> Persisting -> Done | PersistFailed | PersistTimeout
//! ```
//!
//! Les erreurs de calcul échouent avant toute écriture. Une écriture en échec
//! n'annule pas l'autre: le résultat indique l'état de chaque artefact.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use surface_ta::report::SurfacesPayload;
use surface_ta::{
    build_reports, compare, target_folder, ComparisonResult, GeometryExtract, ReportInputs,
    SurfaceError, Workbook,
};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::identity::Identity;
use crate::store::{ArtifactKind, ArtifactStore, ArtifactTarget, StoreError};

/// Étapes du traitement d'une soumission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DispatchState {
    Idle,
    Comparing,
    ThresholdRejected,
    Building,
    Persisting,
    Done,
    PersistFailed,
    PersistTimeout,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ThresholdRejected | Self::Done | Self::PersistFailed | Self::PersistTimeout
        )
    }
}

/// Erreur bloquante: aucune écriture n'a eu lieu
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Saisie refusée (aucun extrait, seuil non atteint)
    #[error("{0}")]
    Rejected(SurfaceError),

    #[error("Report build task failed: {0}")]
    Build(String),
}

impl DispatchError {
    pub fn state(&self) -> DispatchState {
        match self {
            Self::Rejected(_) => DispatchState::ThresholdRejected,
            Self::Build(_) => DispatchState::Building,
        }
    }
}

/// Échec d'écriture d'un artefact
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum PersistError {
    #[error("Persistence failed: {0}")]
    Failed(String),

    #[error("Persistence timed out after {0:?}")]
    Timeout(Duration),
}

impl PersistError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Contenu d'un artefact tel que construit
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactContent {
    Text(String),
    Table(Workbook),
}

impl ArtifactContent {
    /// Empreinte blake3 du contenu (texte brut, ou JSON du classeur)
    pub fn checksum(&self) -> String {
        let hash = match self {
            ArtifactContent::Text(text) => blake3::hash(text.as_bytes()),
            ArtifactContent::Table(workbook) => {
                let json = serde_json::to_vec(workbook).unwrap_or_default();
                blake3::hash(&json)
            }
        };
        hex::encode(hash.as_bytes())
    }
}

/// Artefact écrit avec succès
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportArtifact {
    pub kind: ArtifactKind,
    pub locator: String,
    #[serde(skip)]
    pub content: ArtifactContent,
    pub checksum: String,
}

impl ReportArtifact {
    pub fn new(kind: ArtifactKind, locator: String, content: ArtifactContent) -> Self {
        let checksum = content.checksum();
        Self {
            kind,
            locator,
            content,
            checksum,
        }
    }
}

/// Une soumission complète
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub projet: Option<GeometryExtract>,
    pub existant: Option<GeometryExtract>,
    pub floor_name: String,
    pub threshold: Option<f64>,
    pub identity: Identity,
    pub timestamp: DateTime<Utc>,
}

/// Résultat d'une soumission acceptée
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub comparison: ComparisonResult,
    pub surfaces: SurfacesPayload,
    pub folder: Option<String>,
    pub visa: Result<ReportArtifact, PersistError>,
    pub spreadsheet: Result<ReportArtifact, PersistError>,
    pub state: DispatchState,
}

impl SubmitOutcome {
    pub fn is_complete(&self) -> bool {
        self.state == DispatchState::Done
    }

    /// Artefacts écrits avec succès
    pub fn artifacts(&self) -> impl Iterator<Item = &ReportArtifact> {
        [self.visa.as_ref().ok(), self.spreadsheet.as_ref().ok()]
            .into_iter()
            .flatten()
    }
}

fn final_state(results: &[&Result<ReportArtifact, PersistError>]) -> DispatchState {
    let errors: Vec<&PersistError> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    if errors.is_empty() {
        DispatchState::Done
    } else if errors.iter().any(|e| e.is_timeout()) {
        DispatchState::PersistTimeout
    } else {
        DispatchState::PersistFailed
    }
}

/// Attend une écriture jusqu'à l'échéance commune
async fn persist<F>(
    kind: ArtifactKind,
    deadline: Instant,
    timeout: Duration,
    write: F,
) -> Result<String, PersistError>
where
    F: Future<Output = Result<String, StoreError>>,
{
    match tokio::time::timeout_at(deadline, write).await {
        Ok(Ok(locator)) => Ok(locator),
        Ok(Err(e)) => {
            warn!(artifact = kind.label(), error = %e, "Artifact persistence failed");
            Err(PersistError::Failed(e.to_string()))
        }
        Err(_) => {
            warn!(artifact = kind.label(), timeout = ?timeout, "Artifact persistence timed out");
            Err(PersistError::Timeout(timeout))
        }
    }
}

/// Traite une soumission de bout en bout.
///
/// # Errors
///
/// `DispatchError::Rejected` si la comparaison est refusée (aucune écriture
/// n'est tentée). Les échecs d'écriture ne sont pas des erreurs: ils sont
/// rapportés par artefact dans le [`SubmitOutcome`].
pub async fn submit<S>(
    store: &S,
    request: SubmitRequest,
    timeout: Duration,
) -> Result<SubmitOutcome, DispatchError>
where
    S: ArtifactStore + ?Sized,
{
    let SubmitRequest {
        projet,
        existant,
        floor_name,
        threshold,
        identity,
        timestamp,
    } = request;

    debug!(state = ?DispatchState::Comparing, user = identity.folder_key(), "Dispatch");
    let comparison = compare(projet.as_ref(), existant.as_ref(), &floor_name, threshold, timestamp)
        .map_err(|e| {
            info!(error = %e, "Submission rejected");
            DispatchError::Rejected(e)
        })?;

    debug!(state = ?DispatchState::Building, "Dispatch");
    let folder = target_folder(projet.as_ref(), existant.as_ref());
    let ((visa_text, workbook), surfaces) = tokio::task::spawn_blocking({
        let comparison = comparison.clone();
        move || {
            let inputs = ReportInputs::new(projet.as_ref(), existant.as_ref());
            (build_reports(&comparison, &inputs), inputs.surfaces_payload(&comparison))
        }
    })
    .await
    .map_err(|e| DispatchError::Build(e.to_string()))?;

    debug!(state = ?DispatchState::Persisting, folder = ?folder, "Dispatch");
    let target = ArtifactTarget {
        identity,
        folder: folder.clone(),
        floor_name: comparison.floor_name().to_string(),
        timestamp: comparison.timestamp(),
    };
    let deadline = Instant::now() + timeout;

    let (visa_locator, sheet_locator) = futures::join!(
        persist(
            ArtifactKind::VisaText,
            deadline,
            timeout,
            store.put_visa(&target, &visa_text)
        ),
        persist(
            ArtifactKind::Spreadsheet,
            deadline,
            timeout,
            store.put_spreadsheet(&target, &workbook)
        ),
    );

    let visa = visa_locator.map(|locator| {
        ReportArtifact::new(ArtifactKind::VisaText, locator, ArtifactContent::Text(visa_text))
    });
    let spreadsheet = sheet_locator.map(|locator| {
        ReportArtifact::new(ArtifactKind::Spreadsheet, locator, ArtifactContent::Table(workbook))
    });
    let state = final_state(&[&visa, &spreadsheet]);

    info!(
        floor = comparison.floor_name(),
        surface_projet = comparison.surface_projet(),
        surface_existant = comparison.surface_existant(),
        difference = comparison.difference(),
        state = ?state,
        "Submission processed"
    );

    Ok(SubmitOutcome {
        comparison,
        surfaces,
        folder,
        visa,
        spreadsheet,
        state,
    })
}
