//! # surface-ta
//!
//! Calcul et comparaison de surfaces de plancher à partir d'extraits DXF
//! (projet / existant), pour l'instruction de la taxe d'aménagement.
//!
//! ## Features
//!
//! - Surface des polylignes (formule du lacet) et des cercles
//! - Comparaison projet / existant avec seuil minimal optionnel
//! - Rapports déterministes: visa texte et classeur (Surfaces, SDP, TA)
//! - Types `serde` qui conservent les champs inconnus des extraits
//!
//! ## Usage
//!
//! ```rust,ignore
//! use surface_ta::{build_reports, compare, GeometryExtract, ReportInputs};
//!
//! let projet = GeometryExtract::from_json(&json)?;
//! let result = compare(Some(&projet), None, "R+1", None, chrono::Utc::now())?;
//! println!("Surface projet: {:.2} m²", result.surface_projet());
//!
//! let (visa, workbook) = build_reports(&result, &ReportInputs::new(Some(&projet), None));
//! ```

pub mod area;
pub mod compare;
pub mod error;
pub mod report;
pub mod types;

pub use area::{circle_area, compute_area, polyline_area, ring_area, AreaBreakdown};
pub use compare::{compare, parse_threshold, ComparisonResult, Impact, DEFAULT_FLOOR_NAME};
pub use error::SurfaceError;
pub use report::{build_reports, build_spreadsheet, build_visa_text, ReportInputs, Workbook};
pub use types::{target_folder, Circle, GeometryExtract, Layer, Polyline, Vertex};
