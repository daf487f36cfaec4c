//! Collaborator contracts: the model, its parameters, and the image loader.
//!
//! Network architectures and pixel pipelines live outside this crate. The
//! orchestrator only needs forward/backward over a [`Batch`], mutable access to
//! named parameters, and a thread-safe way to turn a [`Sample`] into a tensor.

use crate::config::DeviceSpec;
use crate::data::{Batch, Sample, Split};
use ndarray::{Array2, Array3, ArrayD, ArrayViewMut2};
use std::path::PathBuf;
use thiserror::Error;

/// Role of a parameter tensor inside the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    /// Learnable weight matrix or kernel; subject to regularization
    Weight,
    Bias,
    /// Normalization scale/shift
    Norm,
}

/// A named learnable tensor with its accumulated gradient.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub role: ParamRole,
    pub value: ArrayD<f32>,
    pub grad: Option<ArrayD<f32>>,
    pub requires_grad: bool,
    /// Part of the classifier head rather than the backbone
    pub classifier: bool,
}

impl Parameter {
    /// Trainable parameter with no gradient yet.
    pub fn new(name: impl Into<String>, role: ParamRole, value: ArrayD<f32>) -> Self {
        Self { name: name.into(), role, value, grad: None, requires_grad: true, classifier: false }
    }

    /// Mark the parameter as belonging to the classifier head.
    pub fn in_classifier(mut self) -> Self {
        self.classifier = true;
        self
    }

    /// Number of scalar elements.
    pub fn numel(&self) -> usize {
        self.value.len()
    }

    /// Drop the accumulated gradient.
    pub fn zero_grad(&mut self) {
        self.grad = None;
    }

    /// Add `grad` into the accumulated gradient.
    pub fn accumulate_grad(&mut self, grad: &ArrayD<f32>) {
        match &mut self.grad {
            Some(existing) => *existing += grad,
            None => self.grad = Some(grad.clone()),
        }
    }

    /// View of the value as `[rows, rest]`; `None` for 0-D and 1-D tensors.
    pub fn rows_view_mut(&mut self) -> Option<ArrayViewMut2<'_, f32>> {
        let shape = self.value.shape().to_vec();
        if shape.len() < 2 {
            return None;
        }
        let rows = shape[0];
        let cols: usize = shape[1..].iter().product();
        if !self.value.is_standard_layout() {
            self.value = self.value.as_standard_layout().into_owned();
        }
        self.value
            .view_mut()
            .into_shape_with_order((rows, cols))
            .ok()
    }
}

/// Failure inside the model collaborator.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ModelError {
    pub message: String,
}

impl ModelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Transient failure loading one example; the example is skipped.
#[derive(Debug, Error)]
#[error("failed to load {}: {message}", path.display())]
pub struct LoadError {
    pub path: PathBuf,
    pub message: String,
}

impl LoadError {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }
}

/// Image classifier driven by the orchestrator.
///
/// `backward` accumulates into [`Parameter::grad`] for every parameter with
/// `requires_grad`; frozen parameters must be left untouched.
pub trait ClassifierModel: Send {
    /// Logits `[batch, num_classes]`.
    fn forward(&mut self, batch: &Batch, train: bool) -> Result<Array2<f32>, ModelError>;

    /// Back-propagate `d loss / d logits` from the last training forward.
    fn backward(&mut self, grad_logits: &Array2<f32>) -> Result<(), ModelError>;

    fn parameters(&self) -> &[Parameter];

    fn parameters_mut(&mut self) -> &mut [Parameter];

    /// Parameters of the classification head.
    fn classifier_parameters(&self) -> Vec<&Parameter> {
        self.parameters().iter().filter(|p| p.classifier).collect()
    }

    /// Clear every gradient.
    fn zero_grad(&mut self) {
        for param in self.parameters_mut() {
            param.zero_grad();
        }
    }

    /// Freeze backbone parameters (or unfreeze everything when `freeze` is false).
    ///
    /// Returns `(frozen, trainable)` parameter counts.
    fn set_backbone_frozen(&mut self, freeze: bool) -> (usize, usize) {
        let mut frozen = 0;
        let mut trainable = 0;
        for param in self.parameters_mut() {
            param.requires_grad = !freeze || param.classifier;
            if param.requires_grad {
                trainable += 1;
            } else {
                frozen += 1;
            }
        }
        (frozen, trainable)
    }

    /// Copy of every parameter value, in parameter order.
    fn snapshot(&self) -> Vec<ArrayD<f32>> {
        self.parameters().iter().map(|p| p.value.clone()).collect()
    }

    /// Restore values captured by [`ClassifierModel::snapshot`].
    fn restore(&mut self, snapshot: &[ArrayD<f32>]) {
        for (param, value) in self.parameters_mut().iter_mut().zip(snapshot) {
            param.value.assign(value);
        }
    }
}

/// Builds models by name.
pub trait ModelFactory {
    fn create_model(
        &self,
        name: &str,
        num_classes: usize,
        device: &DeviceSpec,
    ) -> Result<Box<dyn ClassifierModel>, ModelError>;
}

/// Decodes and augments one sample. Called concurrently from loader workers.
pub trait ImageLoader: Send + Sync {
    fn load(&self, sample: &Sample, split: Split) -> Result<Array3<f32>, LoadError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, ArrayD, IxDyn};

    struct Stub {
        params: Vec<Parameter>,
    }

    impl ClassifierModel for Stub {
        fn forward(&mut self, batch: &Batch, _train: bool) -> Result<Array2<f32>, ModelError> {
            Ok(Array2::zeros((batch.len(), 2)))
        }
        fn backward(&mut self, _grad: &Array2<f32>) -> Result<(), ModelError> {
            Ok(())
        }
        fn parameters(&self) -> &[Parameter] {
            &self.params
        }
        fn parameters_mut(&mut self) -> &mut [Parameter] {
            &mut self.params
        }
    }

    fn stub() -> Stub {
        Stub {
            params: vec![
                Parameter::new("backbone.w", ParamRole::Weight, ArrayD::ones(IxDyn(&[2, 3]))),
                Parameter::new("head.w", ParamRole::Weight, ArrayD::ones(IxDyn(&[2, 2]))).in_classifier(),
                Parameter::new("head.b", ParamRole::Bias, ArrayD::zeros(IxDyn(&[2]))).in_classifier(),
            ],
        }
    }

    #[test]
    fn test_freeze_backbone_counts() {
        let mut model = stub();
        assert_eq!(model.set_backbone_frozen(true), (1, 2));
        assert!(!model.parameters()[0].requires_grad);
        let head: Vec<&str> = model.classifier_parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(head, vec!["head.w", "head.b"]);
        assert_eq!(model.set_backbone_frozen(false), (0, 3));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut model = stub();
        let snap = model.snapshot();
        model.parameters_mut()[1].value.fill(5.0);
        model.restore(&snap);
        assert_eq!(model.parameters()[1].value, ArrayD::<f32>::ones(IxDyn(&[2, 2])));
    }

    #[test]
    fn test_rows_view_skips_vectors() {
        let mut bias = Parameter::new("b", ParamRole::Bias, ArrayD::zeros(IxDyn(&[4])));
        assert!(bias.rows_view_mut().is_none());

        let mut conv = Parameter::new("k", ParamRole::Weight, ArrayD::ones(IxDyn(&[2, 3, 2, 2])));
        let rows = conv.rows_view_mut().unwrap();
        assert_eq!(rows.dim(), (2, 12));
    }

    #[test]
    fn test_accumulate_grad() {
        let mut p = Parameter::new("w", ParamRole::Weight, arr2(&[[1.0f32, 2.0]]).into_dyn());
        let g = arr2(&[[0.5f32, 0.5]]).into_dyn();
        p.accumulate_grad(&g);
        p.accumulate_grad(&g);
        assert_eq!(p.grad.as_ref().unwrap(), &arr2(&[[1.0f32, 1.0]]).into_dyn());
        p.zero_grad();
        assert!(p.grad.is_none());
    }
}
