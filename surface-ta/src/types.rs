//! Types de données pour le crate surface-ta
//!
//! Le schéma suit la sortie JSON du service d'extraction DXF. Les champs
//! non utilisés par le calcul (calques, lignes, arcs, textes, statistiques,
//! attributs supplémentaires des entités) sont conservés tels quels pour
//! être renvoyés dans les rapports.

use geo::{BoundingRect, Coord, LineString, Rect};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::SurfaceError;

/// Résultat d'extraction d'un fichier DXF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryExtract {
    /// Polylignes (LWPOLYLINE / POLYLINE)
    #[serde(default, deserialize_with = "null_as_default")]
    pub polylines: Vec<Polyline>,

    /// Cercles
    #[serde(default, deserialize_with = "null_as_default")]
    pub circles: Vec<Circle>,

    /// Calques du dessin
    #[serde(default, deserialize_with = "null_as_default")]
    pub layers: Vec<Layer>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub lines: Vec<Value>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub arcs: Vec<Value>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub texts: Vec<Value>,

    /// Statistiques calculées par l'extracteur (non interprétées)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Value>,

    /// Chemin du fichier source, relatif au dossier utilisateur (ex: "M1/plan.dxf")
    #[serde(
        rename = "sourcePath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_path: Option<String>,

    /// Dossier parent du fichier source (ex: "M1")
    #[serde(
        rename = "parentFolder",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_folder: Option<String>,
}

/// Sommet 2D en unités du dessin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

impl From<Vertex> for Coord {
    fn from(v: Vertex) -> Self {
        Coord { x: v.x, y: v.y }
    }
}

/// Polyligne extraite
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    /// Sommets dans l'ordre du dessin
    #[serde(default, deserialize_with = "null_as_default")]
    pub vertices: Vec<Vertex>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<bool>,

    /// Attributs non interprétés (type, color, lineweight...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Polyline {
    /// Construit une polyligne à partir de couples (x, y)
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        Self {
            vertices: points.iter().map(|&(x, y)| Vertex { x, y }).collect(),
            ..Default::default()
        }
    }

    /// Affecte un calque (utile pour les tests et les outils)
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn layer_name(&self) -> &str {
        self.layer.as_deref().unwrap_or("")
    }

    /// Boîte englobante des sommets
    pub fn bounding_rect(&self) -> Option<Rect> {
        let coords: Vec<Coord> = self.vertices.iter().map(|&v| v.into()).collect();
        LineString::new(coords).bounding_rect()
    }
}

/// Cercle extrait
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,

    /// Attributs non interprétés (center, color...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Circle {
    pub fn with_radius(radius: f64) -> Self {
        Self {
            radius: Some(radius),
            ..Default::default()
        }
    }
}

/// Calque du dessin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default)]
    pub name: String,

    /// Couleur (entier DXF ou "N/A")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GeometryExtract {
    /// Parse la réponse JSON du service d'extraction.
    ///
    /// # Errors
    ///
    /// - `UpstreamError` si la réponse est un objet `{"error": ...}`
    /// - `MalformedExtract` si le JSON est invalide ou structurellement incorrect
    ///   (ex: `vertices` n'est pas une liste, sommet sans `x`/`y` numériques)
    pub fn from_json(json: &str) -> Result<Self, SurfaceError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| SurfaceError::malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Variante de [`GeometryExtract::from_json`] pour une valeur déjà parsée
    pub fn from_value(value: Value) -> Result<Self, SurfaceError> {
        let Value::Object(ref object) = value else {
            return Err(SurfaceError::malformed("extract must be a JSON object"));
        };

        if let Some(error) = object.get("error") {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(SurfaceError::UpstreamError(message));
        }

        serde_json::from_value(value).map_err(|e| SurfaceError::malformed(e.to_string()))
    }

    /// Aucun élément contribuant à la surface
    pub fn is_empty(&self) -> bool {
        self.polylines.is_empty() && self.circles.is_empty()
    }

    /// `parentFolder` non vide
    fn own_parent_folder(&self) -> Option<&str> {
        self.parent_folder.as_deref().filter(|f| !f.is_empty())
    }
}

/// Premier segment d'un chemin relatif ("M1/plan.dxf" -> "M1")
fn first_segment(path: &str) -> Option<String> {
    let mut parts = path.split('/');
    let first = parts.next()?;
    if parts.next().is_some() && !first.is_empty() {
        Some(first.to_string())
    } else {
        None
    }
}

/// Détermine le dossier cible des rapports.
///
/// Ordre de résolution: `parentFolder` du projet, puis de l'existant, puis
/// premier segment du `sourcePath` (celui du projet s'il en a un, sinon celui
/// de l'existant).
pub fn target_folder(
    projet: Option<&GeometryExtract>,
    existant: Option<&GeometryExtract>,
) -> Option<String> {
    if let Some(folder) = projet
        .and_then(GeometryExtract::own_parent_folder)
        .or_else(|| existant.and_then(GeometryExtract::own_parent_folder))
    {
        return Some(folder.to_string());
    }

    match projet.and_then(|p| p.source_path.as_deref()) {
        Some(path) => first_segment(path),
        None => existant
            .and_then(|e| e.source_path.as_deref())
            .and_then(first_segment),
    }
}

/// Traite `null` comme la valeur par défaut (liste vide)
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
