//! Dataset pipeline: sources, composition, remapping, weighting, sampling, loading.

mod compose;
mod loader;
mod remap;
mod sampler;
mod source;
mod weights;

pub use compose::{compose, ComposedDataset};
pub use loader::{Batch, BatchLoader, EpochBatches, LoaderOptions};
pub use remap::{ClassRemapper, RemappedDataset, Sample};
pub use sampler::{fixed_subset, DrawStrategy, EpochSampler};
pub use source::{AnnotationSource, DatasetSource, FolderSource, LabeledExample, Split, IMAGE_EXTENSIONS};
pub use weights::{class_weights, sample_weights};
