//! Catalog Loader
//!
//! Loads and validates the versioned architecture catalog from JSON.
//! Any structural or semantic failure aborts startup with `InvalidCatalog`.

use std::collections::HashSet;
use std::path::Path;

use crate::models::catalog::{ArchitectureCatalog, ArchitectureEntry};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Catalog file not found: {0}")]
    NotFound(String),
}

/// Load a catalog from a JSON file.
///
/// Accepts either the top-level catalog object or a bare list of entries
/// (treated as an unversioned catalog).
pub fn load_catalog(path: impl AsRef<Path>) -> Result<ArchitectureCatalog, CatalogError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|_| CatalogError::NotFound(path.display().to_string()))?;
    let catalog = parse_catalog(&content)?;
    tracing::info!(
        "Loaded architecture catalog v{} with {} entries from {}",
        catalog.version,
        catalog.len(),
        path.display()
    );
    Ok(catalog)
}

/// Parse and validate catalog JSON.
pub fn parse_catalog(content: &str) -> Result<ArchitectureCatalog, CatalogError> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| CatalogError::InvalidCatalog(format!("not valid JSON: {}", e)))?;

    let catalog: ArchitectureCatalog = if value.is_array() {
        let architectures: Vec<ArchitectureEntry> = serde_json::from_value(value)
            .map_err(|e| CatalogError::InvalidCatalog(format!("bad entry list: {}", e)))?;
        ArchitectureCatalog {
            version: "1.0.0".to_string(),
            generated_at: None,
            source_repo: None,
            architectures,
        }
    } else {
        serde_json::from_value(value)
            .map_err(|e| CatalogError::InvalidCatalog(format!("bad catalog object: {}", e)))?
    };

    validate(&catalog)?;
    Ok(catalog)
}

fn validate(catalog: &ArchitectureCatalog) -> Result<(), CatalogError> {
    if catalog.architectures.is_empty() {
        return Err(CatalogError::InvalidCatalog("catalog contains no entries".into()));
    }

    let mut seen = HashSet::new();
    for entry in &catalog.architectures {
        if entry.architecture_id.trim().is_empty() {
            return Err(CatalogError::InvalidCatalog(format!(
                "entry '{}' has an empty architecture_id",
                entry.name
            )));
        }
        if !seen.insert(entry.architecture_id.as_str()) {
            return Err(CatalogError::InvalidCatalog(format!(
                "duplicate architecture_id '{}'",
                entry.architecture_id
            )));
        }
        if entry.name.trim().is_empty() {
            return Err(CatalogError::InvalidCatalog(format!(
                "entry '{}' has an empty name",
                entry.architecture_id
            )));
        }
        if entry.availability_models.is_empty() {
            return Err(CatalogError::InvalidCatalog(format!(
                "entry '{}' supports no availability models",
                entry.architecture_id
            )));
        }
    }

    Ok(())
}
