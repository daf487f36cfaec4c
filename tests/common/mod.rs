//! Shared fixtures: a linear classifier, a label-encoding image loader and
//! annotation-list writers.

#![allow(dead_code)]

use fases::config::DeviceSpec;
use fases::data::{Batch, Sample, Split};
use fases::model::{ClassifierModel, ImageLoader, LoadError, ModelError, ModelFactory, ParamRole, Parameter};
use ndarray::{Array1, Array2, Array3, Axis, Ix1, Ix2};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Writes the sample's label as a one-hot `[1, 1, k]` image.
pub struct LabelImages {
    pub num_classes: usize,
}

impl ImageLoader for LabelImages {
    fn load(&self, sample: &Sample, _split: Split) -> Result<Array3<f32>, LoadError> {
        if sample.label >= self.num_classes {
            return Err(LoadError::new(&sample.image_path, "label outside the image width"));
        }
        let mut image = Array3::zeros((1, 1, self.num_classes));
        image[[0, 0, sample.label]] = 1.0;
        Ok(image)
    }
}

/// `logits = head · (stem · x) + bias`, with `stem` outside the classifier.
pub struct Linear {
    params: Vec<Parameter>,
    cache: Option<(Array2<f32>, Array2<f32>)>,
}

impl Linear {
    pub fn new(num_classes: usize) -> Self {
        let stem = Array2::<f32>::eye(num_classes);
        let head = Array2::from_shape_fn((num_classes, num_classes), |(i, j)| if i == j { 0.05 } else { 0.0 });
        Self {
            params: vec![
                Parameter::new("stem.weight", ParamRole::Weight, stem.into_dyn()),
                Parameter::new("fc.weight", ParamRole::Weight, head.into_dyn()).in_classifier(),
                Parameter::new("fc.bias", ParamRole::Bias, Array1::<f32>::zeros(num_classes).into_dyn())
                    .in_classifier(),
            ],
            cache: None,
        }
    }

    fn matrix(&self, idx: usize) -> Result<Array2<f32>, ModelError> {
        self.params[idx].value.clone().into_dimensionality::<Ix2>().map_err(|e| ModelError::new(e.to_string()))
    }
}

impl ClassifierModel for Linear {
    fn forward(&mut self, batch: &Batch, train: bool) -> Result<Array2<f32>, ModelError> {
        let rows: Vec<Array1<f32>> = batch.images.iter().map(|img| img.iter().copied().collect()).collect();
        let views: Vec<_> = rows.iter().map(|r| r.view()).collect();
        let x = ndarray::stack(Axis(0), &views).map_err(|e| ModelError::new(e.to_string()))?;
        let bias = self.params[2]
            .value
            .clone()
            .into_dimensionality::<Ix1>()
            .map_err(|e| ModelError::new(e.to_string()))?;
        let h = x.dot(&self.matrix(0)?.t());
        let logits = h.dot(&self.matrix(1)?.t()) + &bias;
        if train {
            self.cache = Some((x, h));
        }
        Ok(logits)
    }

    fn backward(&mut self, grad: &Array2<f32>) -> Result<(), ModelError> {
        let (x, h) = self.cache.take().ok_or_else(|| ModelError::new("backward before forward"))?;
        let d_hidden = grad.dot(&self.matrix(1)?);
        let grads = [
            d_hidden.t().dot(&x).into_dyn(),
            grad.t().dot(&h).into_dyn(),
            grad.sum_axis(Axis(0)).into_dyn(),
        ];
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

/// Builds [`Linear`] models and remembers what it was asked for.
#[derive(Default)]
pub struct LinearFactory {
    pub requests: Mutex<Vec<(String, usize)>>,
}

impl ModelFactory for LinearFactory {
    fn create_model(
        &self,
        name: &str,
        num_classes: usize,
        _device: &DeviceSpec,
    ) -> Result<Box<dyn ClassifierModel>, ModelError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((name.to_string(), num_classes));
        }
        Ok(Box::new(Linear::new(num_classes)))
    }
}

/// Write an annotation list with one `img_<prefix>_<i>.png <label>` line per
/// label, plus an empty image file for every entry under `image_root`.
pub fn write_annotations(path: &Path, image_root: &Path, prefix: &str, labels: &[usize]) {
    fs::create_dir_all(image_root).unwrap();
    let mut body = String::new();
    for (i, label) in labels.iter().enumerate() {
        let name = format!("img_{prefix}_{i}.png");
        fs::write(image_root.join(&name), b"").unwrap();
        body.push_str(&format!("{name} {label}\n"));
    }
    fs::write(path, body).unwrap();
}

/// Labels cycling through `0..num_classes`.
pub fn cycling_labels(len: usize, num_classes: usize) -> Vec<usize> {
    (0..len).map(|i| i % num_classes).collect()
}
