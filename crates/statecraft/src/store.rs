//! Graph Files
//!
//! Reads and writes persisted graphs on disk.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

use statecraft_runtime::{CodecError, MethodRegistry, SavedGraph, StateGraph};

/// Error type for graph file access
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Graph file does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("Failed to access file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid graph: {0}")]
    Codec(#[from] CodecError),
}

/// Load and resolve a graph file against `registry`
pub async fn load_graph(
    path: impl AsRef<Path>,
    registry: &MethodRegistry,
) -> Result<StateGraph, StoreError> {
    let path = path.as_ref();
    if !fs::try_exists(path).await? {
        return Err(StoreError::PathNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).await?;
    let graph = SavedGraph::from_json(&content)?.into_graph(registry)?;
    info!("Loaded graph from {}", path.display());
    Ok(graph)
}

/// Write a graph, creating parent directories as needed
pub async fn save_graph(path: impl AsRef<Path>, graph: &StateGraph) -> Result<(), StoreError> {
    let path = path.as_ref();
    let json = SavedGraph::from_graph(graph)?.to_json()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, json).await?;
    info!("Saved graph to {}", path.display());
    Ok(())
}
