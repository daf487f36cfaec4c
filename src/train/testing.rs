//! Deterministic collaborators for trainer tests.

use crate::data::{Batch, BatchLoader, LoaderOptions, RemappedDataset, Sample, Split};
use crate::model::{ClassifierModel, ImageLoader, LoadError, ModelError, ParamRole, Parameter};
use ndarray::{Array1, Array2, Array3, Axis};
use std::path::PathBuf;
use std::sync::Arc;

/// Encodes the label as a one-hot `[1, 1, k]` image.
pub struct OneHotImages {
    pub num_classes: usize,
}

impl ImageLoader for OneHotImages {
    fn load(&self, sample: &Sample, _split: Split) -> Result<Array3<f32>, LoadError> {
        let mut image = Array3::zeros((1, 1, self.num_classes));
        image[[0, 0, sample.label]] = 1.0;
        Ok(image)
    }
}

/// `logits = W · (B · x) + b` with `B` as the backbone and `W, b` as the head.
pub struct TwoLayer {
    params: Vec<Parameter>,
    inputs: Option<Array2<f32>>,
    hidden: Option<Array2<f32>>,
    /// Training forwards seen so far
    pub forwards: usize,
    /// Training forward index from which logits become NaN
    pub nan_from: Option<usize>,
}

impl TwoLayer {
    pub fn new(num_classes: usize) -> Self {
        let dim = num_classes;
        let backbone = Array2::from_shape_fn((dim, dim), |(i, j)| if i == j { 1.0 } else { 0.1 });
        let head = Array2::from_shape_fn((num_classes, dim), |(i, j)| ((i * 7 + j * 3) % 5) as f32 * 0.01);
        Self {
            params: vec![
                Parameter::new("backbone.weight", ParamRole::Weight, backbone.into_dyn()),
                Parameter::new("head.weight", ParamRole::Weight, head.into_dyn()).in_classifier(),
                Parameter::new("head.bias", ParamRole::Bias, Array1::<f32>::zeros(num_classes).into_dyn())
                    .in_classifier(),
            ],
            inputs: None,
            hidden: None,
            forwards: 0,
            nan_from: None,
        }
    }

    fn matrix(&self, idx: usize) -> Result<Array2<f32>, ModelError> {
        self.params[idx]
            .value
            .clone()
            .into_dimensionality()
            .map_err(|e| ModelError::new(e.to_string()))
    }
}

impl ClassifierModel for TwoLayer {
    fn forward(&mut self, batch: &Batch, train: bool) -> Result<Array2<f32>, ModelError> {
        let rows: Vec<Array1<f32>> = batch.images.iter().map(|img| img.iter().copied().collect()).collect();
        let views: Vec<_> = rows.iter().map(|r| r.view()).collect();
        let x = ndarray::stack(Axis(0), &views).map_err(|e| ModelError::new(e.to_string()))?;

        let backbone = self.matrix(0)?;
        let head = self.matrix(1)?;
        let bias = self.params[2].value.view().into_dimensionality::<ndarray::Ix1>().map_err(|e| ModelError::new(e.to_string()))?.to_owned();
        let h = x.dot(&backbone.t());
        let mut logits = h.dot(&head.t()) + &bias;

        if train {
            if self.nan_from.is_some_and(|n| self.forwards >= n) {
                logits.fill(f32::NAN);
            }
            self.forwards += 1;
            self.inputs = Some(x);
            self.hidden = Some(h);
        }
        Ok(logits)
    }

    fn backward(&mut self, grad: &Array2<f32>) -> Result<(), ModelError> {
        let (Some(x), Some(h)) = (self.inputs.take(), self.hidden.take()) else {
            return Err(ModelError::new("backward without a training forward"));
        };
        let head = self.matrix(1)?;
        let d_head = grad.t().dot(&h);
        let d_bias = grad.sum_axis(Axis(0));
        let d_hidden = grad.dot(&head);
        let d_backbone = d_hidden.t().dot(&x);

        let grads = [d_backbone.into_dyn(), d_head.into_dyn(), d_bias.into_dyn()];
        for (param, g) in self.params.iter_mut().zip(grads) {
            if param.requires_grad {
                param.accumulate_grad(&g);
            }
        }
        Ok(())
    }

    fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.params
    }
}

/// `per_class` examples of each class in every split.
pub fn balanced_dataset(num_classes: usize, per_class: usize) -> RemappedDataset {
    use crate::config::ClassRemapping;
    use crate::data::{ClassRemapper, ComposedDataset, LabeledExample};

    let split_examples = |split: Split| -> Vec<LabeledExample> {
        (0..num_classes * per_class)
            .map(|i| LabeledExample {
                image_path: PathBuf::from(format!("{split}/{i}.png")),
                raw_label: i % num_classes,
                split,
            })
            .collect()
    };
    let composed = ComposedDataset {
        train: split_examples(Split::Train),
        val: split_examples(Split::Val),
        test: split_examples(Split::Test),
        class_names: (0..num_classes).map(|c| format!("class{c}")).collect(),
    };
    let names = composed.class_names.clone();
    ClassRemapper::new(&ClassRemapping::default(), &names)
        .map(|r| r.apply(composed))
        .unwrap()
}

pub fn inline_loader(num_classes: usize, batch_size: usize) -> BatchLoader {
    BatchLoader::new(
        Arc::new(OneHotImages { num_classes }),
        LoaderOptions { batch_size, num_workers: 0, prefetch_depth: 1 },
    )
    .unwrap()
}
