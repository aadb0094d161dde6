//! Stockage des artefacts sur le système de fichiers
//!
//! Arborescence: `<racine>/<clé utilisateur>/<dossier?>/Output/<fichier>`

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use rust_xlsxwriter::{Format, Worksheet, XlsxError};
use surface_ta::report::Cell;
use surface_ta::Workbook;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{ArtifactStore, ArtifactTarget, StoreError};
use crate::identity::Identity;

const OUTPUT_DIR: &str = "Output";

/// Stockage local, un dossier par utilisateur sous `root`
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn user_dir(&self, identity: &Identity) -> PathBuf {
        self.root.join(identity.folder_key())
    }

    /// Écrit `bytes` dans le dossier Output de la cible, renvoie le localisateur
    async fn write(
        &self,
        target: &ArtifactTarget,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, StoreError> {
        let mut relative = match target.folder.as_deref().filter(|f| !f.trim().is_empty()) {
            Some(folder) => {
                relative_path(folder).ok_or_else(|| StoreError::InvalidFolder(folder.to_string()))?
            }
            None => PathBuf::new(),
        };
        relative.push(OUTPUT_DIR);

        let output_dir = self.user_dir(&target.identity).join(&relative);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| StoreError::io(&output_dir, e))?;

        let path = output_dir.join(file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        relative.push(file_name);
        Ok(to_locator(&relative))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put_visa(&self, target: &ArtifactTarget, content: &str) -> Result<String, StoreError> {
        let locator = self
            .write(target, &target.visa_file_name(), content.as_bytes())
            .await?;
        info!(user = target.identity.folder_key(), locator = %locator, "Visa written");
        Ok(locator)
    }

    async fn put_spreadsheet(
        &self,
        target: &ArtifactTarget,
        workbook: &Workbook,
    ) -> Result<String, StoreError> {
        let workbook = workbook.clone();
        let bytes = tokio::task::spawn_blocking(move || render_xlsx(&workbook))
            .await
            .map_err(|e| StoreError::Render(e.to_string()))?
            .map_err(|e| StoreError::Render(e.to_string()))?;

        let locator = self
            .write(target, &target.spreadsheet_file_name(), &bytes)
            .await?;
        info!(
            user = target.identity.folder_key(),
            locator = %locator,
            size = bytes.len(),
            "Spreadsheet written"
        );
        Ok(locator)
    }

    async fn fetch_bytes(&self, identity: &Identity, locator: &str) -> Result<Vec<u8>, StoreError> {
        let relative =
            relative_path(locator).ok_or_else(|| StoreError::InvalidLocator(locator.to_string()))?;
        let user_dir = self.user_dir(identity);

        let direct = user_dir.join(&relative);
        match tokio::fs::read(&direct).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&direct, e)),
        }

        // Fichier déplacé: recherche par nom dans tout le dossier utilisateur
        let Some(file_name) = relative.file_name().map(OsString::from) else {
            return Err(StoreError::NotFound(locator.to_string()));
        };
        debug!(locator = locator, "Artifact not at locator, searching user folder");

        let found = tokio::task::spawn_blocking(move || find_file(&user_dir, &file_name))
            .await
            .map_err(|e| StoreError::io(&direct, std::io::Error::new(std::io::ErrorKind::Other, e)))?
            .ok_or_else(|| StoreError::NotFound(locator.to_string()))?;

        debug!(path = %found.display(), "Artifact found by name");
        tokio::fs::read(&found)
            .await
            .map_err(|e| StoreError::io(&found, e))
    }
}

/// Chemin relatif sûr: uniquement des composants normaux, non vide
fn relative_path(input: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(input.trim()).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!path.as_os_str().is_empty()).then_some(path)
}

fn to_locator(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Premier fichier nommé `name` sous `dir` (parcours trié, donc stable)
fn find_file(dir: &Path, name: &OsString) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == name.as_os_str())
        .map(|e| e.into_path())
}

/// Rendu XLSX du classeur (en-têtes en gras)
pub fn render_xlsx(workbook: &Workbook) -> Result<Vec<u8>, XlsxError> {
    let mut xlsx = rust_xlsxwriter::Workbook::new();
    let header = Format::new().set_bold();

    for sheet in &workbook.sheets {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(&sheet.name)?;

        for (r, row) in sheet.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match cell {
                    Cell::Text(s) if r == 0 => {
                        worksheet.write_string_with_format(r, c, s, &header)?;
                    }
                    Cell::Text(s) => {
                        worksheet.write_string(r, c, s)?;
                    }
                    Cell::Number(n) => {
                        worksheet.write_number(r, c, *n)?;
                    }
                    Cell::Empty => {}
                }
            }
        }

        xlsx.push_worksheet(worksheet);
    }

    xlsx.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use surface_ta::report::Sheet;

    fn target(folder: Option<&str>) -> ArtifactTarget {
        ArtifactTarget {
            identity: Identity::new("jean.dupont@mairie.fr").unwrap(),
            folder: folder.map(str::to_string),
            floor_name: "R+1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 4, 7, 16, 2, 33).unwrap(),
        }
    }

    fn workbook() -> Workbook {
        Workbook {
            sheets: vec![Sheet {
                name: "Surfaces".to_string(),
                rows: vec![
                    vec![Cell::Text("Étage".to_string()), Cell::Text("Surface (m²)".to_string())],
                    vec![Cell::Text("R+1".to_string()), Cell::Number(12.5)],
                    vec![Cell::Empty, Cell::Number(1.0)],
                ],
            }],
        }
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("M1/Output/a.txt"), Some(PathBuf::from("M1/Output/a.txt")));
        assert_eq!(relative_path("./a.txt"), Some(PathBuf::from("a.txt")));
        assert_eq!(relative_path("../other/a.txt"), None);
        assert_eq!(relative_path("M1/../../a.txt"), None);
        assert_eq!(relative_path("/etc/passwd"), None);
        assert_eq!(relative_path(""), None);
    }

    #[test]
    fn test_render_xlsx_is_zip() {
        let bytes = render_xlsx(&workbook()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_put_and_fetch_visa() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let target = target(Some("M1"));

        let locator = store.put_visa(&target, "Surface PROJET: 1.00 m²").await.unwrap();
        assert_eq!(locator, "M1/Output/visa_R+1.txt");
        assert!(dir.path().join("jean.dupont/M1/Output/visa_R+1.txt").exists());

        let content = store.fetch_content(&target.identity, &locator).await.unwrap();
        assert_eq!(content, "Surface PROJET: 1.00 m²");
    }

    #[tokio::test]
    async fn test_put_spreadsheet_at_user_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let target = target(None);

        let locator = store.put_spreadsheet(&target, &workbook()).await.unwrap();
        assert_eq!(locator, "Output/surface_comparison_R_1_20250407_160233.xlsx");

        let bytes = store.fetch_bytes(&target.identity, &locator).await.unwrap();
        assert!(bytes.starts_with(b"PK"));
        assert!(matches!(
            store.fetch_content(&target.identity, &locator).await,
            Err(StoreError::NotText(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_name_search() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let target = target(Some("M2"));
        store.put_visa(&target, "contenu").await.unwrap();

        // Localisateur obsolète: le fichier est retrouvé par son nom
        let content = store
            .fetch_content(&target.identity, "M1/Output/visa_R+1.txt")
            .await
            .unwrap();
        assert_eq!(content, "contenu");
    }

    #[tokio::test]
    async fn test_fetch_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let identity = Identity::new("jean.dupont@mairie.fr").unwrap();

        assert!(matches!(
            store.fetch_bytes(&identity, "../autre/Output/visa.txt").await,
            Err(StoreError::InvalidLocator(_))
        ));
        assert!(matches!(
            store.fetch_bytes(&identity, "Output/absent.txt").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_escaping_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let err = store.put_visa(&target(Some("../x")), "x").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidFolder(_)));
    }
}
