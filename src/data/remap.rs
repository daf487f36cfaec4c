//! Class Remapper: single-hop relabeling into a reduced label space.

use super::compose::ComposedDataset;
use super::source::{LabeledExample, Split};
use crate::config::ClassRemapping;
use crate::error::ConfigError;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// One example after remapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub image_path: PathBuf,
    pub raw_label: usize,
    pub label: usize,
}

/// Dataset after the remapper has run. Only [`ClassRemapper::apply`] builds one,
/// so labels are remapped exactly once.
#[derive(Debug, Clone)]
pub struct RemappedDataset {
    pub train: Vec<Sample>,
    pub val: Vec<Sample>,
    pub test: Vec<Sample>,
    class_names: Vec<String>,
}

impl RemappedDataset {
    /// Examples of one split.
    pub fn split(&self, split: Split) -> &[Sample] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }

    /// Active class-name table.
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Size of the output label space.
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Per-class example counts for `split`.
    pub fn class_counts(&self, split: Split) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes()];
        for sample in self.split(split) {
            counts[sample.label] += 1;
        }
        counts
    }

    /// Labels of `split` in order.
    pub fn labels(&self, split: Split) -> Vec<usize> {
        self.split(split).iter().map(|s| s.label).collect()
    }
}

/// Validated remapping plus the output class-name table.
#[derive(Debug, Clone)]
pub struct ClassRemapper {
    mapping: BTreeMap<usize, usize>,
    class_names: Vec<String>,
}

impl ClassRemapper {
    /// Build a remapper over a raw class table of `raw_names`.
    ///
    /// Every raw index in `0..raw_names.len()` is reachable; the output table
    /// is `final_class_names` when supplied, otherwise the raw names whose index
    /// is still some output value, in their original order.
    pub fn new(remapping: &ClassRemapping, raw_names: &[String]) -> Result<Self, ConfigError> {
        if !remapping.enabled || remapping.mapping.is_empty() {
            let class_names = match (&remapping.final_class_names, remapping.enabled) {
                (Some(names), true) => names.clone(),
                _ => raw_names.to_vec(),
            };
            if class_names.len() != raw_names.len() {
                return Err(ConfigError::invalid(
                    "class_remapping.final_class_names",
                    format!(
                        "{} names given but {} classes are reachable without a mapping",
                        class_names.len(),
                        raw_names.len()
                    ),
                ));
            }
            return Ok(Self { mapping: BTreeMap::new(), class_names });
        }

        let mapping = remapping.mapping.clone();
        for &source in mapping.keys().filter(|&&k| k >= raw_names.len()) {
            tracing::warn!(label = source, "class_remapping.mapping key is not a known raw class");
        }
        let reachable: BTreeSet<usize> =
            (0..raw_names.len()).map(|l| *mapping.get(&l).unwrap_or(&l)).collect();

        let class_names = match &remapping.final_class_names {
            Some(names) => {
                if let Some((from, to)) = mapping.iter().find(|(_, &to)| to >= names.len()) {
                    return Err(ConfigError::invalid(
                        "class_remapping.mapping",
                        format!("{from} -> {to} targets an index outside {} final class names", names.len()),
                    ));
                }
                if let Some(out) = reachable.iter().find(|&&out| out >= names.len()) {
                    return Err(ConfigError::invalid(
                        "class_remapping.final_class_names",
                        format!("unmapped class {out} has no entry among {} final class names", names.len()),
                    ));
                }
                if names.len() != reachable.len() {
                    return Err(ConfigError::invalid(
                        "class_remapping.final_class_names",
                        format!(
                            "{} names given but {} distinct output classes are reachable",
                            names.len(),
                            reachable.len()
                        ),
                    ));
                }
                names.clone()
            }
            None => {
                let contiguous = reachable.iter().copied().eq(0..reachable.len());
                if !contiguous {
                    return Err(ConfigError::invalid(
                        "class_remapping.mapping",
                        format!(
                            "reachable outputs {reachable:?} leave gaps; supply final_class_names or map onto 0..{}",
                            reachable.len()
                        ),
                    ));
                }
                raw_names
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| reachable.contains(idx))
                    .map(|(_, name)| name.clone())
                    .collect()
            }
        };

        Ok(Self { mapping, class_names })
    }

    /// Remap one label: `mapping.get(label, label)`.
    pub fn remap(&self, label: usize) -> usize {
        self.mapping.get(&label).copied().unwrap_or(label)
    }

    /// Output class-name table.
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Consume a composed dataset and remap every example once.
    pub fn apply(&self, dataset: ComposedDataset) -> RemappedDataset {
        let convert = |examples: Vec<LabeledExample>| -> Vec<Sample> {
            examples
                .into_iter()
                .map(|e| Sample { label: self.remap(e.raw_label), raw_label: e.raw_label, image_path: e.image_path })
                .collect()
        };
        if !self.mapping.is_empty() {
            tracing::info!(mapping = ?self.mapping, classes = ?self.class_names, "applying class remapping");
        }
        RemappedDataset {
            train: convert(dataset.train),
            val: convert(dataset.val),
            test: convert(dataset.test),
            class_names: self.class_names.clone(),
        }
    }
}
