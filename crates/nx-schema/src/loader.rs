//! Schema loader with inheritance support

use crate::corpus::{DirectoryCorpus, SchemaSource};
use crate::inheritance::{InheritanceGraph, apply_category_defaults, apply_inheritance_chain};
use crate::model::SchemaClass;
use crate::nxdl::parse_nxdl;
use crate::registry::ConcurrentSchemaRegistry;
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, trace};

const RESOLVED_SUFFIX: &str = "+resolved";

/// Loads classes from a corpus, caching raw and resolved definitions
pub struct SchemaLoader {
    registry: Arc<ConcurrentSchemaRegistry>,
    source: Arc<dyn SchemaSource>,
}

impl SchemaLoader {
    /// Create a loader over the given corpus
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self {
            registry: Arc::new(ConcurrentSchemaRegistry::new()),
            source,
        }
    }

    /// Create a loader searching definition directories
    pub fn from_paths(schema_paths: Vec<PathBuf>) -> Self {
        Self::new(Arc::new(DirectoryCorpus::new(schema_paths)))
    }

    /// Create a loader sharing a pre-configured registry
    pub fn with_registry(
        registry: Arc<ConcurrentSchemaRegistry>,
        source: Arc<dyn SchemaSource>,
    ) -> Self {
        Self { registry, source }
    }

    /// Load a class as written, without inheritance
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the corpus has no definition for `name`,
    /// [`Error::Parse`] if the definition is malformed or defines another
    /// class.
    pub fn load(&self, name: &str) -> Result<Arc<SchemaClass>> {
        if let Some(cached) = self.registry.get(name) {
            debug!(class = name, "Cache hit for schema");
            return Ok(cached);
        }
        trace!(class = name, "Cache miss for schema");

        let text = self.source.fetch(name)?.ok_or_else(|| {
            Error::NotFound(format!("{name} not found in {}", self.source.describe()))
        })?;
        let class = parse_nxdl(&text, name)?;
        if class.name != name {
            return Err(Error::parse(
                name,
                format!("document defines '{}' instead", class.name),
            ));
        }

        let class = Arc::new(class);
        self.registry.register(name, Arc::clone(&class));
        Ok(class)
    }

    /// Load a class merged with its whole `extends` chain
    ///
    /// Base classes in the chain get their category defaults first; the
    /// chain is then merged base → leaf.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for a missing class or parent, [`Error::Parse`]
    /// for malformed definitions and inheritance cycles.
    pub fn load_resolved(&self, name: &str) -> Result<Arc<SchemaClass>> {
        let key = format!("{name}{RESOLVED_SUFFIX}");
        if let Some(cached) = self.registry.get(&key) {
            debug!(class = name, "Cache hit for resolved schema");
            return Ok(cached);
        }

        info!(class = name, "Loading schema with inheritance");
        let chain: Vec<SchemaClass> = self
            .resolve_inheritance_chain(name)?
            .iter()
            .map(|class| {
                let mut class = SchemaClass::clone(class);
                apply_category_defaults(&mut class);
                class
            })
            .collect();

        let merged = apply_inheritance_chain(&chain)
            .ok_or_else(|| Error::parse(name, "cannot merge an empty inheritance chain"))?;
        debug!(
            class = name,
            chain = ?merged.resolved_chain,
            nodes = merged.root.node_count(),
            "Merged inheritance chain"
        );

        let merged = Arc::new(merged);
        self.registry.register(key, Arc::clone(&merged));
        Ok(merged)
    }

    /// Resolve the inheritance chain of a class, base first
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] on a cycle, [`Error::NotFound`] when a parent is
    /// missing from the corpus.
    pub fn resolve_inheritance_chain(&self, name: &str) -> Result<Vec<Arc<SchemaClass>>> {
        let mut graph = InheritanceGraph::new();
        let mut current = self.load(name)?;
        let mut chain = vec![Arc::clone(&current)];

        while let Some(parent) = current.parent_name().map(str::to_string) {
            if graph.would_create_cycle(&current.name, &parent) {
                let mut names: Vec<&str> = chain.iter().map(|c| c.name.as_str()).collect();
                names.push(&parent);
                return Err(Error::parse(
                    name,
                    format!("inheritance cycle: {}", names.join(" -> ")),
                ));
            }
            graph.add_edge(current.name.clone(), parent.clone());

            let parent_class = match self.load(&parent) {
                Ok(class) => class,
                Err(Error::NotFound(_)) => {
                    return Err(Error::NotFound(format!(
                        "parent class {parent} (referenced by {})",
                        current.name
                    )));
                }
                Err(e) => return Err(e),
            };
            chain.push(Arc::clone(&parent_class));
            current = parent_class;
        }

        chain.reverse();
        trace!(
            class = name,
            chain = ?chain.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "Resolved inheritance chain"
        );
        Ok(chain)
    }

    /// Get the registry (for testing/debugging)
    pub fn registry(&self) -> &ConcurrentSchemaRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::MemoryCorpus;
    use crate::model::{NodeKind, Occurrence};

    fn loader(corpus: MemoryCorpus) -> SchemaLoader {
        SchemaLoader::new(Arc::new(corpus))
    }

    #[test]
    fn test_load_caches_raw_class() {
        let loader = loader(MemoryCorpus::new().with(
            "NXbeam",
            r#"<definition name="NXbeam" extends="NXobject"><field name="energy"/></definition>"#,
        ));
        let first = loader.load("NXbeam").unwrap();
        assert!(loader.registry().contains("NXbeam"));
        let second = loader.load("NXbeam").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_load_missing_class() {
        let loader = loader(MemoryCorpus::new());
        assert!(matches!(loader.load("NXnope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_load_rejects_mismatched_name() {
        let loader = loader(MemoryCorpus::new().with("NXa", r#"<definition name="NXb"/>"#));
        assert!(matches!(loader.load("NXa"), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_resolved_chain_applies_base_defaults() {
        let loader = loader(
            MemoryCorpus::new()
                .with(
                    "Beam",
                    r#"<definition name="Beam" extends="NXobject" category="base">
                         <field name="energy" type="NX_FLOAT" units="NX_ENERGY"/>
                       </definition>"#,
                )
                .with(
                    "XRD",
                    r#"<definition name="XRD" extends="Beam" category="application">
                         <field name="wavelength" type="NX_FLOAT"/>
                       </definition>"#,
                ),
        );
        let resolved = loader.load_resolved("XRD").unwrap();
        assert_eq!(resolved.resolved_chain, vec!["Beam", "XRD"]);
        let energy = resolved.root.find_child(NodeKind::Field, "energy").unwrap();
        assert_eq!(energy.occurrence, Some(Occurrence::Optional));
        let wavelength = resolved.root.find_child(NodeKind::Field, "wavelength").unwrap();
        assert_eq!(wavelength.occurrence, None);
        assert!(loader.registry().contains("XRD+resolved"));
    }

    #[test]
    fn test_cycle_is_a_parse_error() {
        let loader = loader(
            MemoryCorpus::new()
                .with("NXa", r#"<definition name="NXa" extends="NXb"/>"#)
                .with("NXb", r#"<definition name="NXb" extends="NXa"/>"#),
        );
        let err = loader.load_resolved("NXa").unwrap_err();
        assert!(err.to_string().contains("inheritance cycle"), "{err}");
    }

    #[test]
    fn test_missing_parent_is_not_found() {
        let loader = loader(
            MemoryCorpus::new().with("NXa", r#"<definition name="NXa" extends="NXmissing"/>"#),
        );
        let err = loader.load_resolved("NXa").unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m.contains("NXmissing")));
    }
}
