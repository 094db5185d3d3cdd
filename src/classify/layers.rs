//! Architectural layer detection from directory and file names.

use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::scan::Inventory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Presentation,
    Business,
    Data,
    Infrastructure,
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LayerKind::Presentation => "presentation",
            LayerKind::Business => "business",
            LayerKind::Data => "data",
            LayerKind::Infrastructure => "infrastructure",
        };
        write!(f, "{}", s)
    }
}

static LAYER_NAMES: phf::Map<&'static str, LayerKind> = phf_map! {
    "controller" => LayerKind::Presentation,
    "controllers" => LayerKind::Presentation,
    "view" => LayerKind::Presentation,
    "views" => LayerKind::Presentation,
    "handler" => LayerKind::Presentation,
    "handlers" => LayerKind::Presentation,
    "route" => LayerKind::Presentation,
    "routes" => LayerKind::Presentation,
    "router" => LayerKind::Presentation,
    "routers" => LayerKind::Presentation,
    "endpoints" => LayerKind::Presentation,
    "api" => LayerKind::Presentation,
    "templates" => LayerKind::Presentation,
    "pages" => LayerKind::Presentation,
    "components" => LayerKind::Presentation,
    "service" => LayerKind::Business,
    "services" => LayerKind::Business,
    "domain" => LayerKind::Business,
    "usecases" => LayerKind::Business,
    "use_cases" => LayerKind::Business,
    "logic" => LayerKind::Business,
    "core" => LayerKind::Business,
    "model" => LayerKind::Data,
    "models" => LayerKind::Data,
    "entity" => LayerKind::Data,
    "entities" => LayerKind::Data,
    "repository" => LayerKind::Data,
    "repositories" => LayerKind::Data,
    "repo" => LayerKind::Data,
    "dao" => LayerKind::Data,
    "db" => LayerKind::Data,
    "database" => LayerKind::Data,
    "schemas" => LayerKind::Data,
    "migrations" => LayerKind::Data,
    "persistence" => LayerKind::Data,
    "middleware" => LayerKind::Infrastructure,
    "middlewares" => LayerKind::Infrastructure,
    "infra" => LayerKind::Infrastructure,
    "infrastructure" => LayerKind::Infrastructure,
    "adapters" => LayerKind::Infrastructure,
    "config" => LayerKind::Infrastructure,
};

/// A detected layer and the paths that revealed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub kind: LayerKind,
    pub matches: Vec<String>,
}

/// Layers named by source-file directories or file stems (`views.py`).
pub(super) fn detect(inventory: &Inventory) -> Vec<Layer> {
    let mut found: BTreeMap<LayerKind, BTreeSet<String>> = BTreeMap::new();

    for file in inventory.source_files() {
        let segments: Vec<&str> = file.path.split('/').collect();
        let (dirs, name) = segments.split_at(segments.len().saturating_sub(1));

        let mut prefix = String::new();
        for dir in dirs {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(dir);
            if let Some(kind) = LAYER_NAMES.get(dir.to_ascii_lowercase().as_str()) {
                found.entry(*kind).or_default().insert(format!("{}/", prefix));
            }
        }

        let stem = name
            .first()
            .and_then(|n| n.split('.').next())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if let Some(kind) = LAYER_NAMES.get(stem.as_str()) {
            found.entry(*kind).or_default().insert(file.path.clone());
        }
    }

    found
        .into_iter()
        .map(|(kind, matches)| Layer {
            kind,
            matches: matches.into_iter().take(5).collect(),
        })
        .collect()
}
