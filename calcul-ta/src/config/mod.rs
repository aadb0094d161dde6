//! Configuration du système
//!
//! Sources, de la plus faible à la plus forte: valeurs par défaut, variables
//! d'environnement (ou fichier JSON), options de la ligne de commande.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use surface_ta::DEFAULT_FLOOR_NAME;

pub const ENV_RESSOURCES_DIR: &str = "CALCULTA_RESSOURCES_DIR";
pub const ENV_PERSIST_TIMEOUT: &str = "CALCULTA_PERSIST_TIMEOUT_SECS";
pub const ENV_DEFAULT_FLOOR: &str = "CALCULTA_DEFAULT_FLOOR";

/// Configuration principale
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Racine des dossiers utilisateurs
    pub ressources_dir: PathBuf,

    /// Délai maximal d'écriture des artefacts (secondes)
    pub persist_timeout_secs: u64,

    /// Nom d'étage quand aucun n'est saisi
    pub default_floor: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ressources_dir: PathBuf::from("./Ressources"),
            persist_timeout_secs: 30,
            default_floor: DEFAULT_FLOOR_NAME.to_string(),
        }
    }
}

impl Config {
    /// Charge la configuration depuis les variables d'environnement
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ressources_dir: std::env::var(ENV_RESSOURCES_DIR)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.ressources_dir),
            persist_timeout_secs: std::env::var(ENV_PERSIST_TIMEOUT)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.persist_timeout_secs),
            default_floor: std::env::var(ENV_DEFAULT_FLOOR)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.default_floor),
        }
    }

    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Applique les options de la ligne de commande
    pub fn apply_overrides(
        &mut self,
        ressources_dir: Option<PathBuf>,
        persist_timeout_secs: Option<u64>,
        default_floor: Option<String>,
    ) {
        if let Some(dir) = ressources_dir {
            self.ressources_dir = dir;
        }
        if let Some(secs) = persist_timeout_secs {
            self.persist_timeout_secs = secs;
        }
        if let Some(floor) = default_floor.filter(|f| !f.trim().is_empty()) {
            self.default_floor = floor;
        }
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs)
    }

    /// Nom d'étage effectif pour une saisie éventuellement vide
    pub fn floor_name<'a>(&'a self, input: Option<&'a str>) -> &'a str {
        match input {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.default_floor,
        }
    }
}
