//! Stockage des artefacts de rapport (visa texte et tableur)
//!
//! Les localisateurs renvoyés sont relatifs au dossier de l'utilisateur
//! (ex: `M1/Output/visa_R+1.txt`) et servent ensuite à la prévisualisation
//! et au téléchargement.

pub mod fs;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use surface_ta::Workbook;
use thiserror::Error;

use crate::identity::Identity;

pub use fs::FsArtifactStore;

/// Type d'artefact produit par une comparaison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ArtifactKind {
    VisaText,
    Spreadsheet,
}

impl ArtifactKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::VisaText => "visa",
            ArtifactKind::Spreadsheet => "spreadsheet",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ArtifactKind::VisaText => "text/plain",
            ArtifactKind::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

/// Destination d'une écriture d'artefact
#[derive(Debug, Clone)]
pub struct ArtifactTarget {
    pub identity: Identity,
    /// Sous-dossier du dossier utilisateur (ex: "M1"), racine si absent
    pub folder: Option<String>,
    pub floor_name: String,
    /// Horodatage de la comparaison, utilisé dans les noms de fichiers
    pub timestamp: DateTime<Utc>,
}

impl ArtifactTarget {
    /// Nom du fichier visa: `visa_<étage>.txt`, espaces remplacés par `_`
    pub fn visa_file_name(&self) -> String {
        let floor: String = self
            .floor_name
            .chars()
            .map(|c| match c {
                ' ' | '/' | '\\' => '_',
                c => c,
            })
            .collect();
        format!("visa_{floor}.txt")
    }

    /// Nom du classeur: `surface_comparison_<étage nettoyé>_<AAAAMMJJ_HHMMSS>.xlsx`
    pub fn spreadsheet_file_name(&self) -> String {
        let floor: String = self
            .floor_name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!(
            "surface_comparison_{}_{}.xlsx",
            floor,
            self.timestamp.format("%Y%m%d_%H%M%S")
        )
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid locator '{0}'")]
    InvalidLocator(String),

    #[error("Invalid target folder '{0}'")]
    InvalidFolder(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Spreadsheet rendering failed: {0}")]
    Render(String),

    #[error("Artifact {0} is not valid UTF-8 text")]
    NotText(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Stockage des artefacts, par utilisateur
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Écrit le visa texte, renvoie son localisateur
    async fn put_visa(&self, target: &ArtifactTarget, content: &str) -> Result<String, StoreError>;

    /// Écrit le classeur, renvoie son localisateur
    async fn put_spreadsheet(
        &self,
        target: &ArtifactTarget,
        workbook: &Workbook,
    ) -> Result<String, StoreError>;

    /// Lit un artefact brut
    async fn fetch_bytes(&self, identity: &Identity, locator: &str) -> Result<Vec<u8>, StoreError>;

    /// Lit un artefact texte (prévisualisation du visa)
    async fn fetch_content(&self, identity: &Identity, locator: &str) -> Result<String, StoreError> {
        let bytes = self.fetch_bytes(identity, locator).await?;
        String::from_utf8(bytes).map_err(|_| StoreError::NotText(locator.to_string()))
    }
}
