//! Tour persistence.
//!
//! Stores hold one serialized `TourDocument`. Saving never touches the
//! in-memory graph, so a failed save can simply be retried.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use formats::{FormatError, RecordError, TourDocument};
use tour::{PanoramaGraph, TourConfig};
use tracing::{debug, warn};

/// Underlying storage error (I/O, quota, network) with its cause attached.
#[derive(Debug)]
pub struct StorageFailure {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl std::fmt::Display for StorageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StorageFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

#[derive(Debug)]
pub enum StoreError {
    StorageFailure(StorageFailure),
    /// Nothing has been saved at this location yet.
    NotFound(String),
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::StorageFailure(e) => write!(f, "tour storage failure: {e}"),
            StoreError::NotFound(location) => write!(f, "no tour saved at {location}"),
            StoreError::Corrupt(msg) => write!(f, "tour storage corrupt: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::StorageFailure(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageFailure> for StoreError {
    fn from(e: StorageFailure) -> Self {
        StoreError::StorageFailure(e)
    }
}

fn decode(raw: &str) -> Result<TourDocument, StoreError> {
    TourDocument::from_json(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn encode(doc: &TourDocument) -> Result<String, StoreError> {
    doc.to_json_pretty().map_err(|e| match e {
        FormatError::Json(e) => StoreError::StorageFailure(StorageFailure::with_source(
            "failed to serialize tour",
            e,
        )),
        other => StoreError::Corrupt(other.to_string()),
    })
}

pub trait TourStore {
    /// Human-readable location used in errors and logs.
    fn location(&self) -> String;
    fn load(&self) -> Result<Option<TourDocument>, StoreError>;
    fn save(&mut self, doc: &TourDocument) -> Result<(), StoreError>;
}

/// Keeps the serialized JSON in memory. `set_failing(true)` makes every
/// `save` fail with a `StorageFailure`.
#[derive(Debug, Default)]
pub struct InMemoryTourStore {
    raw: Option<String>,
    failing: bool,
}

impl InMemoryTourStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

impl TourStore for InMemoryTourStore {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn load(&self) -> Result<Option<TourDocument>, StoreError> {
        self.raw.as_deref().map(decode).transpose()
    }

    fn save(&mut self, doc: &TourDocument) -> Result<(), StoreError> {
        if self.failing {
            return Err(StorageFailure::new("in-memory store is failing").into());
        }
        self.raw = Some(encode(doc)?);
        Ok(())
    }
}

/// JSON file store. Saves go to a sibling temp file which is then renamed
/// over the target, so readers never observe a half-written tour.
#[derive(Debug, Clone)]
pub struct FileTourStore {
    path: PathBuf,
}

impl FileTourStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "tour.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl TourStore for FileTourStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Option<TourDocument>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => decode(&raw).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageFailure::with_source(
                format!("read {}", self.path.display()),
                e,
            )
            .into()),
        }
    }

    fn save(&mut self, doc: &TourDocument) -> Result<(), StoreError> {
        let payload = encode(doc)?;
        let tmp = self.temp_path();
        fs::write(&tmp, payload).map_err(|e| {
            StorageFailure::with_source(format!("write {}", tmp.display()), e)
        })?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(StorageFailure::with_source(
                format!("rename into {}", self.path.display()),
                e,
            )
            .into());
        }
        debug!(path = %self.path.display(), nodes = doc.nodes.len(), "saved tour");
        Ok(())
    }
}

/// Serializes the graph into the store. The graph is only read.
pub fn save_graph(store: &mut dyn TourStore, graph: &PanoramaGraph) -> Result<(), StoreError> {
    let doc = TourDocument::from_graph(graph);
    store.save(&doc).inspect_err(|e| {
        warn!(location = %store.location(), error = %e, "tour save failed");
    })
}

/// Loads the stored tour into a fresh graph. Records that fail to load are
/// returned alongside the graph.
pub fn load_graph(
    store: &dyn TourStore,
    config: TourConfig,
) -> Result<(PanoramaGraph, Vec<RecordError>), StoreError> {
    let doc = store
        .load()?
        .ok_or_else(|| StoreError::NotFound(store.location()))?;
    Ok(doc.into_graph(config))
}
