//! Writes populated entries through a [`ContainerSink`]

use crate::sink::ContainerSink;
use crate::{Error, Result};
use nx_ir::Value;
use nx_schema::NodeKind;
use nx_validation::{EntryValue, PopulatedEntry, Population, storage_type};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Group class used when neither the template nor the path names one
const DEFAULT_GROUP_CLASS: &str = "NXcollection";

/// Counts of what a write produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub groups: usize,
    pub datasets: usize,
    pub links: usize,
    pub attributes: usize,
}

/// Serializes a validated population into a container
///
/// Groups are created first, then datasets (with their `units`), then
/// links, then attributes, so every call finds its parent in place.
pub struct HierarchicalWriter<'s, S: ContainerSink> {
    sink: &'s mut S,
}

impl<'s, S: ContainerSink> HierarchicalWriter<'s, S> {
    pub fn new(sink: &'s mut S) -> Self {
        Self { sink }
    }

    /// Write every entry of `population`
    ///
    /// # Errors
    ///
    /// [`Error::Rejected`] when the population carries errors, otherwise
    /// the first backend failure.
    pub fn write(&mut self, population: &Population) -> Result<WriteSummary> {
        let errors = population.report().errors().count();
        if errors > 0 {
            return Err(Error::Rejected(errors));
        }
        self.write_entries(population.entries())
    }

    /// Write entries without consulting a report
    ///
    /// # Errors
    ///
    /// The first backend failure.
    pub fn write_entries(&mut self, entries: &[PopulatedEntry]) -> Result<WriteSummary> {
        let mut summary = WriteSummary::default();

        let mut created = BTreeSet::new();
        for entry in entries {
            let count = entry.path.segments.len();
            let mut output = String::new();
            for (i, segment) in entry.path.segments.iter().enumerate() {
                if segment.kind == NodeKind::Attribute {
                    break;
                }
                output.push('/');
                output.push_str(&segment.name);
                let is_leaf = i + 1 == count;
                if segment.kind != NodeKind::Group
                    || (is_leaf && matches!(entry.value, EntryValue::Link { .. }))
                {
                    continue;
                }
                if created.insert(output.clone()) {
                    let nx_class = segment.nx_class.as_deref().unwrap_or(DEFAULT_GROUP_CLASS);
                    self.sink.create_group(&output, nx_class)?;
                    summary.groups += 1;
                }
            }
        }

        for entry in entries {
            let EntryValue::Data(value) = &entry.value else { continue };
            if entry.path.kind() != NodeKind::Field {
                continue;
            }
            let path = entry.output_path();
            let dtype = storage_type(entry.data_type, value);
            self.sink.create_dataset(&path, value, dtype, value.shape())?;
            if let Some(unit) = &entry.unit {
                self.sink.set_attribute(&path, "units", &Value::string(unit.as_str()))?;
                summary.attributes += 1;
            }
            summary.datasets += 1;
        }

        for entry in entries {
            if let EntryValue::Link { target } = &entry.value {
                self.sink.create_link(&entry.output_path(), target)?;
                summary.links += 1;
            }
        }

        for entry in entries {
            let EntryValue::Data(value) = &entry.value else { continue };
            if !entry.path.is_attribute() {
                continue;
            }
            let owner = entry
                .path
                .parent()
                .map_or_else(|| "/".to_string(), |parent| parent.output_path());
            let value = value.cast(storage_type(entry.data_type, value))?;
            self.sink.set_attribute(&owner, entry.path.name(), &value)?;
            summary.attributes += 1;
        }

        debug!(?summary, "Wrote population");
        info!(
            groups = summary.groups,
            datasets = summary.datasets,
            links = summary.links,
            attributes = summary.attributes,
            "Container written"
        );
        Ok(summary)
    }
}
