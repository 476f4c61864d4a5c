//! Conversion driver
//!
//! Runs one conversion end to end: reader, template, population, writer
//! and commit. The output file only appears after every stage succeeded.

use std::path::PathBuf;

use nx_adapter_container::{Hdf5Container, HierarchicalWriter, WriteSummary};
use nx_ir::Contribution;
use nx_mapping::{Mapping, MappingDsl, ReaderRegistry};
use nx_schema::SchemaLoader;
use nx_template::{Template, build_template};
use nx_validation::{CancellationToken, DiagnosticsReport, PopulationEngine};
use tracing::{debug, info, warn};

use crate::{ConversionConfig, Error, Result};

/// Result of a committed conversion
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    /// File that was committed
    pub output: PathBuf,

    /// What the writer created
    pub summary: WriteSummary,

    /// Diagnostics of the run; warnings only, or nothing
    pub report: DiagnosticsReport,

    /// Number of populated entries
    pub entries: usize,
}

/// Drives conversions for one configuration
pub struct Converter {
    config: ConversionConfig,
    loader: SchemaLoader,
    readers: ReaderRegistry,
    cancel: CancellationToken,
}

impl Converter {
    /// Converter loading schemas from the configured search paths
    #[must_use]
    pub fn new(config: ConversionConfig) -> Self {
        let loader = SchemaLoader::from_paths(config.schema_paths.clone());
        Self {
            config,
            loader,
            readers: ReaderRegistry::with_defaults(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a different schema loader
    #[must_use]
    pub fn with_loader(mut self, loader: SchemaLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Use a different reader registry
    #[must_use]
    pub fn with_readers(mut self, readers: ReaderRegistry) -> Self {
        self.readers = readers;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Handle that cancels this converter's runs
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Build the template for the configured application and mix-ins
    ///
    /// # Errors
    ///
    /// Schema loading or template conflicts.
    pub fn template(&self) -> Result<Template> {
        Ok(build_template(
            &self.loader,
            &self.config.application,
            &self.config.mixins,
        )?)
    }

    /// Run the configured reader over the configured inputs
    ///
    /// Without a mapping file the reader gets an empty mapping.
    ///
    /// # Errors
    ///
    /// Mapping, registry and reader errors, or [`Error::Pipeline`] when the
    /// reader does not support the application.
    pub fn read_inputs(&self) -> Result<Vec<Contribution>> {
        let mapping = match &self.config.mapping {
            Some(path) => MappingDsl::parse_file(path)?,
            None => Mapping {
                name: self.config.reader.clone(),
                description: None,
                rules: Vec::new(),
            },
        };

        let reader = self.readers.get(&self.config.reader)?;
        if !reader.supports(&self.config.application) {
            return Err(Error::pipeline(
                "read",
                &self.config.reader,
                format!("reader does not support {}", self.config.application),
            ));
        }

        let output = reader.read(&self.config.inputs, &mapping)?;
        debug!(
            reader = %self.config.reader,
            mapping = %mapping.name,
            contributions = output.contributions.len(),
            "Inputs read"
        );
        Ok(output.contributions)
    }

    /// Read the inputs and convert them
    ///
    /// # Errors
    ///
    /// See [`Converter::read_inputs`] and [`Converter::convert_contributions`].
    pub fn convert(&self) -> Result<ConversionOutcome> {
        self.cancel.check("read")?;
        let contributions = self.read_inputs()?;
        self.convert_contributions(&contributions)
    }

    /// Populate, validate, write and commit `contributions`
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the strictness level rejects the report,
    /// a cancellation error when the token fired, and any schema, template
    /// or container failure. Nothing is written in any of these cases.
    pub fn convert_contributions(
        &self,
        contributions: &[Contribution],
    ) -> Result<ConversionOutcome> {
        let template = self.template()?;
        let population = PopulationEngine::new(&template, self.config.validation.clone())
            .populate(contributions, &self.cancel)?;

        let report = population.report().clone();
        if self.config.strictness.rejects(&report) {
            warn!(
                application = %self.config.application,
                errors = report.errors().count(),
                warnings = report.warnings().count(),
                "Conversion rejected"
            );
            return Err(Error::validation(report));
        }

        let mut container = Hdf5Container::create(&self.config.output)?;
        let summary = HierarchicalWriter::new(&mut container).write(&population)?;

        self.cancel.check("commit")?;
        container.commit()?;
        info!(
            application = %self.config.application,
            output = %self.config.output.display(),
            groups = summary.groups,
            datasets = summary.datasets,
            warnings = report.warnings().count(),
            "Conversion committed"
        );

        Ok(ConversionOutcome {
            output: self.config.output.clone(),
            summary,
            report,
            entries: population.entries().len(),
        })
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("readers", &self.readers)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nx_mapping::{Reader, ReaderOutput};
    use nx_schema::MemoryCorpus;
    use std::sync::Arc;

    const BEAM: &str = r#"<definition name="NXbeam" type="group" extends="NXobject" category="base">
  <field name="energy" type="NX_FLOAT" units="NX_ENERGY"/>
</definition>"#;

    const APP: &str = r#"<definition name="NXtiny" type="group" category="application">
  <group name="beam" type="NXbeam">
    <field name="energy" type="NX_FLOAT" units="NX_ENERGY"/>
  </group>
</definition>"#;

    const OBJECT: &str = r#"<definition name="NXobject" type="group" category="base"/>"#;

    fn loader() -> SchemaLoader {
        let corpus = MemoryCorpus::new()
            .with("NXobject", OBJECT)
            .with("NXbeam", BEAM)
            .with("NXtiny", APP);
        SchemaLoader::new(Arc::new(corpus))
    }

    struct PickyReader;

    impl Reader for PickyReader {
        fn name(&self) -> &str {
            "picky"
        }

        fn supported_definitions(&self) -> &[&str] {
            &["NXmpes"]
        }

        fn read(
            &self,
            _inputs: &[PathBuf],
            _mapping: &Mapping,
        ) -> nx_mapping::Result<ReaderOutput> {
            Ok(ReaderOutput::default())
        }
    }

    #[test]
    fn test_unsupported_application_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ConversionConfig::new("NXtiny", dir.path().join("out.nxs"));
        config.reader = "picky".to_string();
        let readers = ReaderRegistry::with_defaults();
        readers.register(Arc::new(PickyReader)).unwrap();

        let converter = Converter::new(config).with_loader(loader()).with_readers(readers);
        let err = converter.convert().unwrap_err();
        assert!(matches!(err, Error::Pipeline { ref operation, .. } if operation == "read"), "{err}");
    }

    #[test]
    fn test_unknown_reader_is_a_mapping_error() {
        let mut config = ConversionConfig::new("NXtiny", "unused.nxs");
        config.reader = "hdf5".to_string();
        let err = Converter::new(config).with_loader(loader()).convert().unwrap_err();
        assert!(matches!(err, Error::Mapping(nx_mapping::Error::UnknownReader(_))), "{err}");
    }

    #[test]
    fn test_converts_in_memory_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("tiny.nxs");
        let converter = Converter::new(ConversionConfig::new("NXtiny", &output)).with_loader(loader());

        let outcome = converter
            .convert_contributions(&[Contribution::data("/beam/energy", 8.0).with_unit("keV")])
            .unwrap();
        assert_eq!(outcome.output, output);
        assert_eq!(outcome.entries, 1);
        assert_eq!(outcome.summary.datasets, 1);
        assert!(!outcome.report.has_errors());
        assert!(output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
