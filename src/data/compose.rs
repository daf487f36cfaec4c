//! Dataset Composer: merges declared sources into train/val/test splits.

use super::source::{DatasetSource, LabeledExample, Split};
use crate::error::{ConfigError, Error, Result};

/// Composed (not yet remapped) dataset.
#[derive(Debug, Clone, Default)]
pub struct ComposedDataset {
    pub train: Vec<LabeledExample>,
    pub val: Vec<LabeledExample>,
    pub test: Vec<LabeledExample>,
    /// Raw class-name table, indexed by raw label
    pub class_names: Vec<String>,
}

impl ComposedDataset {
    /// Examples of one split.
    pub fn split(&self, split: Split) -> &[LabeledExample] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }

    fn split_mut(&mut self, split: Split) -> &mut Vec<LabeledExample> {
        match split {
            Split::Train => &mut self.train,
            Split::Val => &mut self.val,
            Split::Test => &mut self.test,
        }
    }

    /// Largest raw label across all splits.
    pub fn max_raw_label(&self) -> Option<usize> {
        Split::ALL
            .iter()
            .flat_map(|&split| self.split(split).iter().map(|e| e.raw_label))
            .max()
    }
}

/// Compose `sources` in declaration order.
///
/// Duplicate image paths are kept. The first source is the default source:
/// a source that omits `val` or `test` contributes nothing to that split.
/// `class_names`, when given, fixes the raw class-name table.
pub fn compose(sources: &[DatasetSource], class_names: Option<&[String]>) -> Result<ComposedDataset> {
    if sources.is_empty() {
        return Err(ConfigError::invalid("dataset.sources", "at least one source is required").into());
    }
    for (idx, source) in sources.iter().enumerate() {
        if !source.declares(Split::Train) {
            return Err(ConfigError::invalid(
                format!("dataset.sources[{idx}]"),
                "source declares no train split",
            )
            .into());
        }
    }

    let folder_classes = shared_folder_classes(sources)?;

    let mut dataset = ComposedDataset::default();
    for split in Split::ALL {
        for source in sources {
            let examples = source.enumerate_examples(split, folder_classes.as_deref())?;
            tracing::debug!(
                split = %split,
                source = %source.describe(split),
                count = examples.len(),
                "enumerated source split"
            );
            dataset.split_mut(split).extend(examples);
        }
    }

    if dataset.train.is_empty() {
        return Err(Error::data(Split::Train, sources[0].describe(Split::Train), "training split is empty"));
    }
    if dataset.val.is_empty() {
        return Err(Error::data(Split::Val, sources[0].describe(Split::Val), "validation split is empty"));
    }

    dataset.class_names = resolve_class_names(&dataset, class_names, folder_classes)?;

    tracing::info!(
        train = dataset.train.len(),
        val = dataset.val.len(),
        test = dataset.test.len(),
        classes = dataset.class_names.len(),
        "composed dataset"
    );
    Ok(dataset)
}

/// Class directories of the first folder source; later folder sources must agree.
fn shared_folder_classes(sources: &[DatasetSource]) -> Result<Option<Vec<String>>> {
    let mut shared: Option<Vec<String>> = None;
    for source in sources {
        if let DatasetSource::Folder(folder) = source {
            let classes = folder.class_names()?;
            match &shared {
                None => shared = Some(classes),
                Some(existing) if *existing != classes => {
                    tracing::warn!(
                        root = %folder.root.display(),
                        "folder source class directories differ from the first folder source; labels follow the first"
                    );
                }
                Some(_) => {}
            }
        }
    }
    Ok(shared)
}

fn resolve_class_names(
    dataset: &ComposedDataset,
    explicit: Option<&[String]>,
    folder_classes: Option<Vec<String>>,
) -> Result<Vec<String>> {
    let max_label = dataset.max_raw_label().unwrap_or(0);
    let names = match (explicit, folder_classes) {
        (Some(names), _) => names.to_vec(),
        (None, Some(folders)) => folders,
        (None, None) => (0..=max_label).map(|label| label.to_string()).collect(),
    };

    for split in Split::ALL {
        if let Some(example) = dataset.split(split).iter().find(|e| e.raw_label >= names.len()) {
            return Err(Error::data(
                split,
                example.image_path.display().to_string(),
                format!(
                    "raw label {} has no entry in a class table of {} names",
                    example.raw_label,
                    names.len()
                ),
            ));
        }
    }
    Ok(names)
}
