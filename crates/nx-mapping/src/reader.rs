//! Reader plugin interface
//!
//! A reader turns instrument files into ordered contributions. Errors it
//! returns go straight back to the caller; they never become diagnostics.

use crate::dsl::Mapping;
use crate::runtime::MappingRuntime;
use crate::{Error, Result};
use nx_ir::Contribution;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// What a reader hands to the population engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReaderOutput {
    /// Contributions in the order they should be merged
    pub contributions: Vec<Contribution>,

    /// Raw data document the contributions were taken from, if any
    pub data: Option<serde_json::Value>,
}

/// Instrument reader
pub trait Reader: Send + Sync {
    /// Registry name (`json_map`)
    fn name(&self) -> &str;

    /// Application definitions the reader can fill; `*` means any
    fn supported_definitions(&self) -> &[&str] {
        &["*"]
    }

    /// Whether the reader can produce data for `application`
    fn supports(&self, application: &str) -> bool {
        self.supported_definitions()
            .iter()
            .any(|d| *d == "*" || *d == application)
    }

    /// Read `inputs` and apply `mapping` to them
    ///
    /// # Errors
    ///
    /// Any failure to read or interpret the inputs.
    fn read(&self, inputs: &[PathBuf], mapping: &Mapping) -> Result<ReaderOutput>;
}

/// Reader that copies values out of JSON or YAML data files
///
/// Every input is parsed and deep-merged into one document, later files
/// winning on conflicting keys. The mapping's `field` rules then pick
/// values from it by slash path.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMapReader;

impl JsonMapReader {
    pub const NAME: &'static str = "json_map";

    /// Parse one data file by extension
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedInput`] for unknown extensions, otherwise I/O and
    /// parse errors.
    pub fn load_document(path: &Path) -> Result<serde_json::Value> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&text)?),
            Some("yaml" | "yml") => Ok(serde_yaml::from_str(&text)?),
            _ => Err(Error::UnsupportedInput(path.display().to_string())),
        }
    }
}

fn merge(into: &mut serde_json::Value, from: serde_json::Value) {
    match (into, from) {
        (serde_json::Value::Object(target), serde_json::Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

impl Reader for JsonMapReader {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn read(&self, inputs: &[PathBuf], mapping: &Mapping) -> Result<ReaderOutput> {
        let mut document: Option<serde_json::Value> = None;
        for path in inputs {
            let loaded = Self::load_document(path)?;
            debug!(path = %path.display(), "Loaded data document");
            match &mut document {
                Some(existing) => merge(existing, loaded),
                None => document = Some(loaded),
            }
        }

        let mut runtime = MappingRuntime::new(Self::NAME);
        if let Some(document) = &document {
            runtime = runtime.with_data(document);
        }
        let contributions = runtime.apply(mapping, Vec::new())?;
        info!(
            reader = Self::NAME,
            inputs = inputs.len(),
            contributions = contributions.len(),
            "Read inputs"
        );
        Ok(ReaderOutput {
            contributions,
            data: document,
        })
    }
}

/// Registry of readers by name
#[derive(Clone, Default)]
pub struct ReaderRegistry {
    readers: Arc<Mutex<HashMap<String, Arc<dyn Reader>>>>,
}

impl ReaderRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the shipped readers
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut readers: HashMap<String, Arc<dyn Reader>> = HashMap::new();
        readers.insert(JsonMapReader::NAME.to_string(), Arc::new(JsonMapReader));
        Self {
            readers: Arc::new(Mutex::new(readers)),
        }
    }

    /// Register a reader under its own name, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn register(&self, reader: Arc<dyn Reader>) -> Result<()> {
        let mut readers = self
            .readers
            .lock()
            .map_err(|_| Error::Registry("Failed to lock reader registry".to_string()))?;
        readers.insert(reader.name().to_string(), reader);
        Ok(())
    }

    /// Look up a reader
    ///
    /// # Errors
    ///
    /// [`Error::UnknownReader`] when nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Reader>> {
        let readers = self
            .readers
            .lock()
            .map_err(|_| Error::Registry("Failed to lock reader registry".to_string()))?;
        readers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownReader(name.to_string()))
    }

    /// Registered names, sorted
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn names(&self) -> Result<Vec<String>> {
        let readers = self
            .readers
            .lock()
            .map_err(|_| Error::Registry("Failed to lock reader registry".to_string()))?;
        let mut names: Vec<String> = readers.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl std::fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderRegistry")
            .field("readers", &self.names().unwrap_or_default())
            .finish()
    }
}
