//! Définition et implémentation des commandes CLI
//!
//! - `compute`: comparaison projet / existant et écriture des deux rapports
//! - `area`: détail de surface d'un extrait
//! - `preview`: contenu d'un visa déjà écrit
//! - `download`: copie locale d'un artefact

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use surface_ta::{parse_threshold, AreaBreakdown, GeometryExtract};
use tracing::{info, warn};

use crate::config::Config;
use crate::dispatch::{submit, DispatchError, SubmitRequest};
use crate::identity::Identity;
use crate::report::{SubmitReport, SubmitStatus};
use crate::store::{ArtifactStore, FsArtifactStore};

/// Identité de l'utilisateur (email ou jeton)
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct IdentityArgs {
    /// User email (folder key is the part before '@')
    #[arg(long)]
    pub email: Option<String>,

    /// JWT whose payload carries the 'email' (or 'sub') claim
    #[arg(long)]
    pub token: Option<String>,
}

impl IdentityArgs {
    pub fn resolve(&self) -> Result<Identity> {
        match (&self.email, &self.token) {
            (Some(email), _) => Identity::new(email.as_str()).context("Invalid --email"),
            (None, Some(token)) => Identity::from_token(token).context("Invalid --token"),
            (None, None) => anyhow::bail!("Either --email or --token is required"),
        }
    }
}

/// Emplacement du stockage et configuration
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// JSON config file (défaut : variables d'environnement CALCULTA_*)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Root of the user folders (défaut : env CALCULTA_RESSOURCES_DIR / ./Ressources)
    #[arg(long)]
    pub ressources: Option<PathBuf>,
}

impl StoreArgs {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::from_env(),
        };
        config.apply_overrides(self.ressources.clone(), None, None);
        Ok(config)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare projet and existant extracts, then write visa and spreadsheet reports
    Compute {
        /// Extract JSON of the projet drawing
        #[arg(long)]
        projet: Option<PathBuf>,

        /// Extract JSON of the existant drawing
        #[arg(long)]
        existant: Option<PathBuf>,

        /// Floor name (défaut : env CALCULTA_DEFAULT_FLOOR / "Sans nom")
        #[arg(long)]
        floor: Option<String>,

        /// Minimum projet surface, free text ("12.5 m²"); non-numeric means no threshold
        #[arg(long)]
        threshold: Option<String>,

        #[command(flatten)]
        identity: IdentityArgs,

        #[command(flatten)]
        store: StoreArgs,

        /// Persistence timeout in seconds (défaut : env CALCULTA_PERSIST_TIMEOUT_SECS / 30)
        #[arg(long)]
        timeout: Option<u64>,

        /// Save the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print the surface breakdown of one extract
    Area {
        /// Extract JSON file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the content of a visa report
    Preview {
        /// Artifact locator, relative to the user folder
        #[arg(short, long)]
        file: String,

        #[command(flatten)]
        identity: IdentityArgs,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Copy a report artifact to a local path
    Download {
        /// Artifact locator, relative to the user folder
        #[arg(short, long)]
        file: String,

        /// Output file or directory
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        identity: IdentityArgs,

        #[command(flatten)]
        store: StoreArgs,
    },
}

/// Lit et valide un extrait JSON
pub async fn read_extract(path: &Path) -> Result<GeometryExtract> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read extract: {}", path.display()))?;
    GeometryExtract::from_json(&json)
        .with_context(|| format!("Invalid extract: {}", path.display()))
}

async fn read_optional(path: Option<&Path>) -> Result<Option<GeometryExtract>> {
    match path {
        Some(path) => read_extract(path).await.map(Some),
        None => Ok(None),
    }
}

/// Exécute la commande compute
#[allow(clippy::too_many_arguments)]
pub async fn cmd_compute(
    projet: Option<&Path>,
    existant: Option<&Path>,
    floor: Option<String>,
    threshold: Option<String>,
    identity: &IdentityArgs,
    store_args: &StoreArgs,
    timeout: Option<u64>,
    report_path: Option<&Path>,
) -> Result<()> {
    let started_at = Instant::now();

    let mut config = store_args.load_config()?;
    config.apply_overrides(None, timeout, None);
    let identity = identity.resolve()?;

    let threshold_value = threshold.as_deref().and_then(parse_threshold);
    if let (Some(raw), None) = (&threshold, threshold_value) {
        warn!(threshold = %raw, "Threshold is not numeric, no minimum applied");
    }

    let floor_name = config.floor_name(floor.as_deref()).to_string();
    info!(
        floor = %floor_name,
        projet = ?projet.map(Path::display),
        existant = ?existant.map(Path::display),
        threshold = ?threshold_value,
        user = identity.folder_key(),
        "Starting comparison"
    );

    let (projet, existant) = tokio::try_join!(read_optional(projet), read_optional(existant))?;

    let request = SubmitRequest {
        projet,
        existant,
        floor_name: floor_name.clone(),
        threshold: threshold_value,
        identity,
        timestamp: chrono::Utc::now(),
    };

    let store = FsArtifactStore::new(&config.ressources_dir);
    let result = submit(&store, request, config.persist_timeout()).await;

    let report = match &result {
        Ok(outcome) => SubmitReport::from_outcome(outcome, started_at.elapsed()),
        Err(e) => SubmitReport::from_error(&floor_name, e, started_at.elapsed()),
    };
    report.display();

    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .with_context(|| format!("Failed to save report: {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }

    match (result, report.status) {
        (Err(DispatchError::Rejected(e)), _) => Err(anyhow::Error::new(e).context("Submission rejected")),
        (Err(e), _) => Err(e.into()),
        (Ok(_), SubmitStatus::Failed) => anyhow::bail!("No report could be written"),
        (Ok(_), _) => Ok(()),
    }
}

/// Exécute la commande area
pub async fn cmd_area(input: &Path) -> Result<()> {
    let extract = read_extract(input).await?;
    let breakdown = AreaBreakdown::of(Some(&extract));

    println!("=== {} ===", input.display());
    for (idx, (polyline, area)) in extract.polylines.iter().zip(&breakdown.polylines).enumerate() {
        println!(
            "  #{:<4} {:<32} {:>4} vertices {:>12.2} m²",
            idx + 1,
            polyline.layer_name(),
            polyline.vertices.len(),
            area
        );
    }
    println!("Polylines: {} ({:.2} m²)", breakdown.polylines.len(), breakdown.polyline_total);
    println!("Circles:   {} ({:.2} m²)", breakdown.circle_count, breakdown.circle_total);
    println!("Total:     {:.2} m²", breakdown.total());

    Ok(())
}

/// Exécute la commande preview
pub async fn cmd_preview(file: &str, identity: &IdentityArgs, store_args: &StoreArgs) -> Result<()> {
    let config = store_args.load_config()?;
    let identity = identity.resolve()?;
    let store = FsArtifactStore::new(&config.ressources_dir);

    let content = store
        .fetch_content(&identity, file)
        .await
        .with_context(|| format!("Failed to preview {}", file))?;
    println!("{}", content);
    Ok(())
}

/// Exécute la commande download
pub async fn cmd_download(
    file: &str,
    output: &Path,
    identity: &IdentityArgs,
    store_args: &StoreArgs,
) -> Result<()> {
    let config = store_args.load_config()?;
    let identity = identity.resolve()?;
    let store = FsArtifactStore::new(&config.ressources_dir);

    let bytes = store
        .fetch_bytes(&identity, file)
        .await
        .with_context(|| format!("Failed to download {}", file))?;

    let destination = if output.is_dir() {
        let name = Path::new(file)
            .file_name()
            .context("Locator has no file name")?;
        output.join(name)
    } else {
        output.to_path_buf()
    };

    tokio::fs::write(&destination, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", destination.display()))?;
    info!(file = file, output = %destination.display(), size = bytes.len(), "Artifact downloaded");
    println!("{} -> {}", file, destination.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_args_resolve() {
        let args = IdentityArgs {
            email: Some("marie@ville.fr".to_string()),
            token: None,
        };
        assert_eq!(args.resolve().unwrap().folder_key(), "marie");

        let empty = IdentityArgs {
            email: None,
            token: None,
        };
        assert!(empty.resolve().is_err());
    }

    #[test]
    fn test_store_args_override() {
        let args = StoreArgs {
            config: None,
            ressources: Some(PathBuf::from("/srv/ressources")),
        };
        let config = args.load_config().unwrap();
        assert_eq!(config.ressources_dir, PathBuf::from("/srv/ressources"));
    }

    #[tokio::test]
    async fn test_read_extract_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extract.json");
        tokio::fs::write(&path, r#"{"error": "DXF illisible"}"#).await.unwrap();

        let err = read_extract(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("DXF illisible"));
        assert!(read_extract(&dir.path().join("absent.json")).await.is_err());
    }
}
