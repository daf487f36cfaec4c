//! Batch loading: ordered parallel decode feeding a bounded prefetch queue.
//!
//! Each batch is loaded by a rayon pool and reassembled in draw order, so the
//! epoch's sequence of examples is exactly the sampler's order regardless of
//! worker count. A producer thread keeps at most `prefetch_depth` batches
//! ahead of the training step.

use super::remap::Sample;
use super::source::Split;
use crate::error::{ConfigError, Result};
use crate::model::ImageLoader;
use ndarray::Array3;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

/// One mini-batch, in draw order.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub images: Vec<Array3<f32>>,
    pub targets: Vec<usize>,
    /// Positions of the examples in their split
    pub indices: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Loader sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    pub batch_size: usize,
    /// 0 loads on the calling thread
    pub num_workers: usize,
    pub prefetch_depth: usize,
}

/// Builds per-epoch batch streams over a shared sample table.
pub struct BatchLoader {
    images: Arc<dyn ImageLoader>,
    pool: Option<Arc<rayon::ThreadPool>>,
    options: LoaderOptions,
    skipped: Arc<AtomicUsize>,
}

impl BatchLoader {
    pub fn new(images: Arc<dyn ImageLoader>, options: LoaderOptions) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be > 0").into());
        }
        let pool = if options.num_workers > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(options.num_workers)
                .thread_name(|i| format!("fases-loader-{i}"))
                .build()
                .map_err(|e| ConfigError::invalid("num_workers", e.to_string()))?;
            Some(Arc::new(pool))
        } else {
            None
        };
        Ok(Self { images, pool, options, skipped: Arc::new(AtomicUsize::new(0)) })
    }

    pub fn options(&self) -> LoaderOptions {
        self.options
    }

    /// Examples skipped because the image loader failed, since construction.
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Stream the batches of one epoch over `samples[order[..]]`.
    pub fn epoch(&self, samples: Arc<[Sample]>, order: Vec<usize>, split: Split) -> EpochBatches {
        let job = LoadJob {
            images: Arc::clone(&self.images),
            pool: self.pool.clone(),
            samples,
            split,
            skipped: Arc::clone(&self.skipped),
        };
        let chunks: Vec<Vec<usize>> =
            order.chunks(self.options.batch_size).map(<[usize]>::to_vec).collect();

        if self.pool.is_none() {
            return EpochBatches { backend: Backend::Inline { job, chunks: chunks.into_iter() } };
        }

        let (tx, rx) = mpsc::sync_channel(self.options.prefetch_depth.max(1));
        let handle = thread::spawn(move || {
            for chunk in chunks {
                let batch = job.load(&chunk);
                if tx.send(batch).is_err() {
                    return;
                }
            }
        });
        EpochBatches { backend: Backend::Prefetch { rx: Some(rx), handle: Some(handle) } }
    }
}

struct LoadJob {
    images: Arc<dyn ImageLoader>,
    pool: Option<Arc<rayon::ThreadPool>>,
    samples: Arc<[Sample]>,
    split: Split,
    skipped: Arc<AtomicUsize>,
}

impl LoadJob {
    fn load(&self, chunk: &[usize]) -> Batch {
        let load_one = |&idx: &usize| (idx, self.images.load(&self.samples[idx], self.split));
        let loaded: Vec<_> = match &self.pool {
            // par_iter over a slice collects in input order
            Some(pool) => pool.install(|| chunk.par_iter().map(load_one).collect()),
            None => chunk.iter().map(load_one).collect(),
        };

        let mut batch = Batch {
            images: Vec::with_capacity(chunk.len()),
            targets: Vec::with_capacity(chunk.len()),
            indices: Vec::with_capacity(chunk.len()),
        };
        for (idx, result) in loaded {
            match result {
                Ok(image) => {
                    batch.images.push(image);
                    batch.targets.push(self.samples[idx].label);
                    batch.indices.push(idx);
                }
                Err(err) => {
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(split = %self.split, index = idx, error = %err, "skipping example");
                }
            }
        }
        batch
    }
}

enum Backend {
    Inline { job: LoadJob, chunks: std::vec::IntoIter<Vec<usize>> },
    Prefetch { rx: Option<Receiver<Batch>>, handle: Option<thread::JoinHandle<()>> },
}

/// Iterator over one epoch's batches. Batches whose every example failed to
/// load are dropped.
pub struct EpochBatches {
    backend: Backend,
}

impl Iterator for EpochBatches {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        loop {
            let batch = match &mut self.backend {
                Backend::Inline { job, chunks } => job.load(&chunks.next()?),
                Backend::Prefetch { rx, handle } => {
                    let received = rx.as_ref()?.recv();
                    match received {
                        Ok(batch) => batch,
                        Err(_) => {
                            // The producer hung up: either the epoch is done or it panicked.
                            rx.take();
                            if let Some(Err(payload)) = handle.take().map(thread::JoinHandle::join) {
                                std::panic::resume_unwind(payload);
                            }
                            return None;
                        }
                    }
                }
            };
            if !batch.is_empty() {
                return Some(batch);
            }
        }
    }
}

impl Drop for EpochBatches {
    fn drop(&mut self) {
        if let Backend::Prefetch { rx, handle } = &mut self.backend {
            // Closing the receiver unblocks a producer waiting on a full queue.
            drop(rx.take());
            if let Some(handle) = handle.take() {
                let _ = handle.join();
            }
        }
    }
}
