//! Dataset sources: annotation lists and class-per-directory folders.
//!
//! Both variants expose the same capability, [`DatasetSource::enumerate_examples`],
//! which yields the labeled examples of one split in file order.

use crate::error::{ConfigError, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// File extensions accepted when scanning folder sources.
pub const IMAGE_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "ppm", "bmp", "pgm", "tif", "tiff", "webp"];

/// Dataset split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    /// All splits in canonical order.
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    /// Lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One composed example, before class remapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledExample {
    pub image_path: PathBuf,
    pub raw_label: usize,
    pub split: Split,
}

/// Annotation-list source: one `relative/path label` entry per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSource {
    /// Image root shared by all splits
    pub root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<PathBuf>,
    /// Per-split image root overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_root: Option<PathBuf>,
}

impl AnnotationSource {
    fn list_path(&self, split: Split) -> Option<&Path> {
        match split {
            Split::Train => self.train.as_deref(),
            Split::Val => self.val.as_deref(),
            Split::Test => self.test.as_deref(),
        }
    }

    /// Image root for `split`: the per-split override when present, else `root`.
    pub fn image_root(&self, split: Split) -> &Path {
        let overridden = match split {
            Split::Train => self.train_root.as_deref(),
            Split::Val => self.val_root.as_deref(),
            Split::Test => self.test_root.as_deref(),
        };
        overridden.unwrap_or(&self.root)
    }
}

/// Directory-structured source: `root/<split_subdir>/<class>/<image>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderSource {
    pub root: PathBuf,
    #[serde(default = "default_train_subdir")]
    pub train: Option<PathBuf>,
    #[serde(default = "default_val_subdir")]
    pub val: Option<PathBuf>,
    #[serde(default = "default_test_subdir")]
    pub test: Option<PathBuf>,
}

fn default_train_subdir() -> Option<PathBuf> {
    Some(PathBuf::from("train"))
}

fn default_val_subdir() -> Option<PathBuf> {
    Some(PathBuf::from("val"))
}

fn default_test_subdir() -> Option<PathBuf> {
    Some(PathBuf::from("test"))
}

impl FolderSource {
    fn subdir(&self, split: Split) -> Option<&Path> {
        match split {
            Split::Train => self.train.as_deref(),
            Split::Val => self.val.as_deref(),
            Split::Test => self.test.as_deref(),
        }
    }

    /// `root/<subdir>` for `split`; a subdirectory that escapes `root` is rejected.
    fn split_dir(&self, split: Split) -> Result<Option<PathBuf>> {
        match self.subdir(split) {
            Some(sub) if !ensure_under_root(sub) => Err(ConfigError::invalid(
                format!("dataset.sources.{split}"),
                format!("folder subdirectory '{}' escapes root {}", sub.display(), self.root.display()),
            )
            .into()),
            Some(sub) => Ok(Some(self.root.join(sub))),
            None => Ok(None),
        }
    }

    /// Class directory names of the train split, sorted; they define label indices.
    pub fn class_names(&self) -> Result<Vec<String>> {
        let dir = self
            .split_dir(Split::Train)?
            .ok_or_else(|| Error::data(Split::Train, self.root.display().to_string(), "folder source has no train subdirectory"))?;
        list_class_dirs(&dir, Split::Train)
    }
}

/// A dataset source, tagged by `type` in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatasetSource {
    Annotation(AnnotationSource),
    Folder(FolderSource),
}

impl DatasetSource {
    /// Short description used in error context.
    pub fn describe(&self, split: Split) -> String {
        match self {
            DatasetSource::Annotation(src) => match src.list_path(split) {
                Some(path) => path.display().to_string(),
                None => src.root.display().to_string(),
            },
            DatasetSource::Folder(src) => match src.subdir(split) {
                Some(sub) => src.root.join(sub).display().to_string(),
                None => src.root.display().to_string(),
            },
        }
    }

    /// Whether the source declares `split` at all.
    pub fn declares(&self, split: Split) -> bool {
        match self {
            DatasetSource::Annotation(src) => src.list_path(split).is_some(),
            DatasetSource::Folder(src) => src.subdir(split).is_some(),
        }
    }

    /// Rebase relative paths onto `base` (the config file's directory).
    pub fn resolve_relative(&mut self, base: &Path) {
        let rebase = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        match self {
            DatasetSource::Annotation(src) => {
                rebase(&mut src.root);
                for path in [
                    &mut src.train,
                    &mut src.val,
                    &mut src.test,
                    &mut src.train_root,
                    &mut src.val_root,
                    &mut src.test_root,
                ]
                .into_iter()
                .flatten()
                {
                    rebase(path);
                }
            }
            DatasetSource::Folder(src) => rebase(&mut src.root),
        }
    }

    /// Enumerate the examples of `split`. Undeclared splits yield nothing.
    ///
    /// `folder_classes` fixes the label order for folder sources; when `None`
    /// the source's own train class directories are used.
    pub fn enumerate_examples(
        &self,
        split: Split,
        folder_classes: Option<&[String]>,
    ) -> Result<Vec<LabeledExample>> {
        match self {
            DatasetSource::Annotation(src) => match src.list_path(split) {
                Some(list) => read_annotation_list(list, src.image_root(split), split),
                None => Ok(Vec::new()),
            },
            DatasetSource::Folder(src) => match src.split_dir(split)? {
                // Default subdirectories are optional outside the train split.
                Some(dir) if split != Split::Train && !dir.is_dir() => {
                    tracing::debug!(dir = %dir.display(), split = %split, "folder split directory absent");
                    Ok(Vec::new())
                }
                Some(dir) => {
                    let own;
                    let classes = match folder_classes {
                        Some(classes) => classes,
                        None => {
                            own = src.class_names()?;
                            &own
                        }
                    };
                    scan_folder(&dir, classes, split)
                }
                None => Ok(Vec::new()),
            },
        }
    }
}

/// Reject entries that would escape their declared root.
fn ensure_under_root(entry: &Path) -> bool {
    !entry.is_absolute()
        && entry
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn read_annotation_list(list: &Path, root: &Path, split: Split) -> Result<Vec<LabeledExample>> {
    let origin = list.display().to_string();
    let content = fs::read_to_string(list)
        .map_err(|e| Error::data(split, &origin, format!("cannot read annotation file: {e}")))?;

    let mut examples = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let at = format!("{origin}:{}", idx + 1);
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            return Err(Error::data(split, at, format!("expected '<path> <label>', got '{line}'")));
        }
        let label_str = parts[parts.len() - 1];
        let raw_label: usize = label_str.parse().map_err(|_| {
            Error::data(split, &at, format!("label '{label_str}' is not a non-negative integer"))
        })?;
        let rel = PathBuf::from(parts[..parts.len() - 1].join(" "));
        if !ensure_under_root(&rel) {
            return Err(Error::data(
                split,
                at,
                format!("image path '{}' escapes root {}", rel.display(), root.display()),
            ));
        }
        let image_path = root.join(rel);
        if !image_path.is_file() {
            return Err(Error::data(split, at, format!("image file {} does not exist", image_path.display())));
        }
        examples.push(LabeledExample { image_path, raw_label, split });
    }

    if examples.is_empty() {
        return Err(Error::data(split, origin, "annotation file contains no samples"));
    }
    Ok(examples)
}

fn list_class_dirs(dir: &Path, split: Split) -> Result<Vec<String>> {
    let origin = dir.display().to_string();
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::data(split, &origin, format!("cannot read split directory: {e}")))?;
    let mut classes = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(format!("listing {origin}"), e))?;
        if entry.path().is_dir() {
            classes.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    classes.sort();
    if classes.is_empty() {
        return Err(Error::data(split, origin, "no class directories found"));
    }
    Ok(classes)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn collect_images(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_images(&path, out)?;
        } else if has_image_extension(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn scan_folder(dir: &Path, classes: &[String], split: Split) -> Result<Vec<LabeledExample>> {
    let found = list_class_dirs(dir, split)?;
    if let Some(unknown) = found.iter().find(|name| !classes.contains(name)) {
        return Err(Error::data(
            split,
            dir.display().to_string(),
            format!("class directory '{unknown}' is not among the train classes"),
        ));
    }

    let mut examples = Vec::new();
    for (label, class) in classes.iter().enumerate() {
        let class_dir = dir.join(class);
        if !class_dir.is_dir() {
            continue;
        }
        let mut images = Vec::new();
        collect_images(&class_dir, &mut images)
            .map_err(|e| Error::io(format!("scanning {}", class_dir.display()), e))?;
        examples.extend(
            images
                .into_iter()
                .map(|image_path| LabeledExample { image_path, raw_label: label, split }),
        );
    }
    Ok(examples)
}
