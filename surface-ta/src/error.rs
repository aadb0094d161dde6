//! Types d'erreurs pour le crate surface-ta

use thiserror::Error;

/// Erreurs pouvant survenir lors du calcul et de la comparaison de surfaces
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SurfaceError {
    /// Aucun extrait (ni projet ni existant) fourni
    #[error("Missing input: at least one projet or existant extract is required")]
    MissingInput,

    /// Surface projet inférieure au seuil configuré
    #[error(
        "Surface projet ({surface_projet:.2} m²) is below the threshold ({threshold} m²)"
    )]
    ThresholdViolation { surface_projet: f64, threshold: f64 },

    /// Le service d'extraction a renvoyé une erreur
    #[error("Extraction failed upstream: {0}")]
    UpstreamError(String),

    /// Extrait structurellement invalide (ex: `vertices` n'est pas une liste)
    #[error("Malformed extract: {reason}")]
    MalformedExtract { reason: String },
}

impl SurfaceError {
    /// Crée une erreur d'extrait invalide avec contexte
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedExtract {
            reason: reason.into(),
        }
    }

    /// Indique si l'erreur relève d'une validation utilisateur
    /// (message de formulaire) plutôt que d'un défaut des données
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingInput | Self::ThresholdViolation { .. }
        )
    }
}
