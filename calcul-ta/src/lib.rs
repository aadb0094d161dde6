//! # calcul-ta
//!
//! Calcul des surfaces de plancher projet / existant à partir d'extraits DXF,
//! puis écriture du visa texte et du classeur de comparaison dans le dossier
//! de l'utilisateur.
//!
//! ## Features
//!
//! - Identité par email ou jeton JWT (clé de dossier = partie locale)
//! - Écriture concurrente des deux rapports avec délai maximal commun
//! - Stockage local des artefacts, prévisualisation et téléchargement
//! - Rapport d'exécution JSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Comparaison et génération des rapports
//! calcul-ta compute --projet projet.json --existant existant.json --floor "R+1" --email jean@mairie.fr
//!
//! # Surface d'un extrait
//! calcul-ta area --input projet.json
//!
//! # Relire un visa
//! calcul-ta preview --file M1/Output/visa_R+1.txt --email jean@mairie.fr
//! ```

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod identity;
pub mod report;
pub mod store;

pub use config::Config;
pub use dispatch::{submit, DispatchError, DispatchState, PersistError, SubmitOutcome, SubmitRequest};
pub use identity::{Identity, IdentityError};
pub use report::{SubmitReport, SubmitStatus};
pub use store::{ArtifactStore, ArtifactTarget, FsArtifactStore, StoreError};
