//! Conversion settings
//!
//! Loadable from YAML:
//!
//! ```yaml
//! application: NXxrd_scan
//! schema_paths: [definitions]
//! output: out/scan.nxs
//! reader: json_map
//! inputs: [scan.json]
//! mapping: xrd.mapping.yaml
//! strictness: strict
//! validation:
//!   missing_unit: error
//! ```

use crate::policies::StrictnessLevel;
use crate::{Error, Result};
use nx_mapping::JsonMapReader;
use nx_validation::ValidationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_reader() -> String {
    JsonMapReader::NAME.to_string()
}

/// Everything one conversion needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// Application definition to convert into
    pub application: String,

    /// Directories searched for `<name>.nxdl.xml`
    #[serde(default)]
    pub schema_paths: Vec<PathBuf>,

    /// Base classes or definitions overlaid on the application
    #[serde(default)]
    pub mixins: Vec<String>,

    /// Container file to commit
    pub output: PathBuf,

    #[serde(default)]
    pub strictness: StrictnessLevel,

    #[serde(default)]
    pub validation: ValidationConfig,

    /// Registered reader name
    #[serde(default = "default_reader")]
    pub reader: String,

    /// Files handed to the reader
    #[serde(default)]
    pub inputs: Vec<PathBuf>,

    /// Mapping file applied by the reader
    #[serde(default)]
    pub mapping: Option<PathBuf>,
}

impl ConversionConfig {
    /// Settings with defaults for everything but the application and output
    pub fn new(application: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            application: application.into(),
            schema_paths: Vec::new(),
            mixins: Vec::new(),
            output: output.into(),
            strictness: StrictnessLevel::default(),
            validation: ValidationConfig::default(),
            reader: default_reader(),
            inputs: Vec::new(),
            mapping: None,
        }
    }

    #[must_use]
    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_paths.push(path.into());
        self
    }

    #[must_use]
    pub fn with_mixin(mut self, name: impl Into<String>) -> Self {
        self.mixins.push(name.into());
        self
    }

    #[must_use]
    pub fn with_strictness(mut self, strictness: StrictnessLevel) -> Self {
        self.strictness = strictness;
        self
    }

    #[must_use]
    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.inputs.push(path.into());
        self
    }

    #[must_use]
    pub fn with_mapping(mut self, path: impl Into<PathBuf>) -> Self {
        self.mapping = Some(path.into());
        self
    }

    /// Parse YAML settings
    ///
    /// # Errors
    ///
    /// [`Error::Pipeline`] describing the YAML problem.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| Error::pipeline("configure", "<inline>", e.to_string()))
    }

    /// Load settings from a YAML file
    ///
    /// Relative paths inside the file are taken relative to the file's
    /// directory.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] when the file cannot be read and [`Error::Pipeline`]
    /// when it does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io("read config", &display, e.to_string()))?;
        let mut config: Self = serde_yaml::from_str(&text)
            .map_err(|e| Error::pipeline("configure", &display, e.to_string()))?;
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.rebase(base);
        }
        Ok(config)
    }

    /// Prefix every relative path with `base`
    fn rebase(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.schema_paths.iter_mut().for_each(rebase);
        self.inputs.iter_mut().for_each(rebase);
        self.mapping.iter_mut().for_each(rebase);
        rebase(&mut self.output);
    }
}
