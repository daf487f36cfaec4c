//! YAML schema definitions for declarative multi-phase training
//!
//! Top-level keys split into run-wide settings ([`RunSpec`]) and phase blocks
//! ([`PhaseConfig`]). Phase blocks declared at the top level are the base every
//! phase inherits from; see [`crate::config::merge`] for the override rules.

use crate::data::DatasetSource;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Deserialize a bool from either a YAML boolean (`true`) or a quoted string (`"true"`).
pub(crate) fn deserialize_bool_lenient<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Str(s) => match s.to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected 'true' or 'false', got '{other}'"
            ))),
        },
    }
}

/// Keys of the phase blocks; everything else at the top level is run-wide.
pub const PHASE_KEYS: &[&str] = &[
    "training",
    "regularization",
    "optimizer",
    "scheduler",
    "criterion_a",
    "criterion_a_params",
    "criterion_b",
    "criterion_b_params",
    "first_stage_epochs",
    "weighted_random_sampler",
];

/// Run-wide settings shared by every phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSpec {
    pub dataset: DatasetSpec,

    pub batch_size: usize,

    /// Loader worker threads; 0 loads on the training thread
    pub num_workers: usize,

    /// Batches buffered ahead of the training step
    pub prefetch_depth: usize,

    pub seed: u64,

    /// Raw class-name table, indexed by raw label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_names: Option<Vec<String>>,

    pub class_remapping: ClassRemapping,

    /// Model names; the first one is trained
    pub model_names: Vec<String>,

    /// Passed through untouched to the image loader
    pub augmentation: serde_yaml::Mapping,

    pub results_dir: PathBuf,

    pub device: DeviceSpec,
}

impl Default for RunSpec {
    fn default() -> Self {
        Self {
            dataset: DatasetSpec::default(),
            batch_size: 32,
            num_workers: 4,
            prefetch_depth: 2,
            seed: 42,
            class_names: None,
            class_remapping: ClassRemapping::default(),
            model_names: vec!["default".to_string()],
            augmentation: serde_yaml::Mapping::new(),
            results_dir: PathBuf::from("results"),
            device: DeviceSpec::default(),
        }
    }
}

impl RunSpec {
    /// Model trained by this run.
    pub fn model_name(&self) -> &str {
        self.model_names.first().map(String::as_str).unwrap_or("default")
    }
}

/// Dataset sources in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSpec {
    pub sources: Vec<DatasetSource>,
}

/// Relabeling of raw class indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassRemapping {
    #[serde(deserialize_with = "deserialize_bool_lenient")]
    pub enabled: bool,

    /// raw label → output label; labels not listed map to themselves
    pub mapping: BTreeMap<usize, usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_class_names: Option<Vec<String>>,
}

/// Device placement, forwarded to the model factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSpec {
    #[serde(deserialize_with = "deserialize_bool_lenient")]
    pub use_cuda: bool,
    #[serde(deserialize_with = "deserialize_bool_lenient")]
    pub multi_gpu: bool,
}

impl Default for DeviceSpec {
    fn default() -> Self {
        Self { use_cuda: true, multi_gpu: false }
    }
}

/// Fully resolved configuration of one training phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    pub name: String,

    pub training: TrainingParams,

    pub regularization: RegularizationSpec,

    pub optimizer: OptimizerSpec,

    pub scheduler: SchedulerSpec,

    /// Criterion used before the switch epoch
    pub criterion_a: String,

    pub criterion_a_params: CriterionParams,

    /// Criterion used from `first_stage_epochs` onwards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criterion_b: Option<String>,

    pub criterion_b_params: CriterionParams,

    /// Switch epoch (0-based); 0 starts directly with `criterion_b`
    pub first_stage_epochs: usize,

    pub weighted_random_sampler: SamplerSpec,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            name: "main".to_string(),
            training: TrainingParams::default(),
            regularization: RegularizationSpec::default(),
            optimizer: OptimizerSpec::default(),
            scheduler: SchedulerSpec::default(),
            criterion_a: "cross_entropy".to_string(),
            criterion_a_params: CriterionParams::default(),
            criterion_b: None,
            criterion_b_params: CriterionParams::default(),
            first_stage_epochs: 0,
            weighted_random_sampler: SamplerSpec::default(),
        }
    }
}

/// Validation metric that drives best-model selection, plateau detection and early stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Monitor {
    /// Mean per-class recall
    #[default]
    ValAccMacro,
    ValAcc,
    ValF1Macro,
    ValF1Weighted,
    ValLoss,
}

impl Monitor {
    /// Direction in which the metric improves.
    pub fn mode(self) -> PlateauMode {
        match self {
            Monitor::ValLoss => PlateauMode::Min,
            _ => PlateauMode::Max,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Monitor::ValAccMacro => "val_acc_macro",
            Monitor::ValAcc => "val_acc",
            Monitor::ValF1Macro => "val_f1_macro",
            Monitor::ValF1Weighted => "val_f1_weighted",
            Monitor::ValLoss => "val_loss",
        }
    }
}

/// Training hyperparameters of one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    pub num_epochs: usize,

    /// Epochs without improvement before the phase stops
    pub patience: usize,

    /// Fraction of the training split used every epoch
    pub train_ratio: f32,

    /// Global gradient-norm clip; `None` or ≤ 0 disables
    pub clip_grad_norm: Option<f32>,

    #[serde(deserialize_with = "deserialize_bool_lenient")]
    pub restore_best_weights: bool,

    /// Non-finite batches skipped before the phase is declared diverged
    pub max_nonfinite_batches: usize,

    #[serde(deserialize_with = "deserialize_bool_lenient")]
    pub freeze_backbone: bool,

    pub monitor: Monitor,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            num_epochs: 25,
            patience: 5,
            train_ratio: 1.0,
            clip_grad_norm: Some(1.0),
            restore_best_weights: true,
            max_nonfinite_batches: 0,
            freeze_backbone: false,
            monitor: Monitor::default(),
        }
    }
}

impl TrainingParams {
    /// Effective clipping threshold.
    pub fn grad_clip(&self) -> Option<f32> {
        self.clip_grad_norm.filter(|&c| c > 0.0)
    }
}

/// Which weight tensors regularization touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegularizationScope {
    #[default]
    All,
    Classifier,
}

/// Post-step weight-norm constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegularizationSpec {
    pub max_norm: MaxNormSpec,
    pub tau_normalization: TauNormSpec,
    pub scope: RegularizationScope,
}

/// Max-norm projection (PGD)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxNormSpec {
    #[serde(deserialize_with = "deserialize_bool_lenient")]
    pub enabled: bool,
    pub thresh: f32,
    /// Norm order; `.inf` selects the max norm
    pub lp_norm: f32,
    pub tau: f32,
}

impl Default for MaxNormSpec {
    fn default() -> Self {
        Self { enabled: false, thresh: 0.1, lp_norm: 2.0, tau: 1.0 }
    }
}

/// Periodic rescaling of every weight vector to norm `tau`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TauNormSpec {
    #[serde(deserialize_with = "deserialize_bool_lenient")]
    pub enabled: bool,
    pub lp_norm: f32,
    pub tau: f32,
    /// Applied on epochs where `epoch % apply_frequency == 0`
    pub apply_frequency: usize,
}

impl Default for TauNormSpec {
    fn default() -> Self {
        Self { enabled: false, lp_norm: 2.0, tau: 1.0, apply_frequency: 1 }
    }
}

/// Optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSpec {
    /// Optimizer name: "sgd" | "adam" | "adamw"
    #[serde(rename = "type")]
    pub kind: String,

    pub lr: f32,

    /// Defaults to 0.01 for adamw and 0 otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_decay: Option<f32>,

    pub momentum: f32,

    #[serde(deserialize_with = "deserialize_bool_lenient")]
    pub nesterov: bool,

    pub betas: (f32, f32),

    pub eps: f32,
}

impl Default for OptimizerSpec {
    fn default() -> Self {
        Self {
            kind: "adamw".to_string(),
            lr: 1e-3,
            weight_decay: None,
            momentum: 0.9,
            nesterov: false,
            betas: (0.9, 0.999),
            eps: 1e-8,
        }
    }
}

impl OptimizerSpec {
    pub fn effective_weight_decay(&self) -> f32 {
        self.weight_decay
            .unwrap_or(if self.kind == "adamw" { 0.01 } else { 0.0 })
    }
}

/// Direction of improvement for a monitored metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlateauMode {
    Min,
    #[default]
    Max,
}

/// How `threshold` is compared against the best value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMode {
    #[default]
    Rel,
    Abs,
}

/// Learning-rate scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSpec {
    /// "reduce_on_plateau" | "step" | "cosine" | "constant"
    #[serde(rename = "type")]
    pub kind: String,
    pub mode: PlateauMode,
    pub factor: f32,
    pub patience: usize,
    pub threshold: f32,
    pub threshold_mode: ThresholdMode,
    pub cooldown: usize,
    pub min_lr: f32,
    pub step_size: usize,
    pub gamma: f32,
    /// Cosine period in epochs; defaults to the phase's `num_epochs`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t_max: Option<usize>,
    pub eta_min: f32,
}

impl Default for SchedulerSpec {
    fn default() -> Self {
        Self {
            kind: "reduce_on_plateau".to_string(),
            mode: PlateauMode::Max,
            factor: 0.1,
            patience: 5,
            threshold: 1e-4,
            threshold_mode: ThresholdMode::Rel,
            cooldown: 0,
            min_lr: 0.0,
            step_size: 10,
            gamma: 0.1,
            t_max: None,
            eta_min: 0.0,
        }
    }
}

/// Criterion parameters; each criterion reads the keys it understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriterionParams {
    /// cross_entropy
    pub label_smoothing: f32,
    /// focal (default 2.0) and class_balanced (default 0.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f32>,
    /// class_balanced effective-number decay
    pub beta: f32,
}

impl Default for CriterionParams {
    fn default() -> Self {
        Self { label_smoothing: 0.0, gamma: None, beta: 0.999 }
    }
}

/// Per-class weight formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightCalculation {
    /// 1 / count
    #[default]
    Inverse,
    /// total / (classes * count)
    Balanced,
    /// `custom_weights[class]`
    Custom,
}

/// Weighted random sampler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSpec {
    #[serde(deserialize_with = "deserialize_bool_lenient")]
    pub enabled: bool,
    #[serde(deserialize_with = "deserialize_bool_lenient")]
    pub replacement: bool,
    pub weight_calculation: WeightCalculation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_weights: Option<Vec<f64>>,
    #[serde(deserialize_with = "deserialize_bool_lenient")]
    pub apply_sqrt: bool,
    pub min_weight: f64,
    pub max_weight: f64,
}

impl Default for SamplerSpec {
    fn default() -> Self {
        Self {
            enabled: false,
            replacement: true,
            weight_calculation: WeightCalculation::Inverse,
            custom_weights: None,
            apply_sqrt: false,
            min_weight: 0.1,
            max_weight: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_defaults() {
        let phase: PhaseConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(phase.training.num_epochs, 25);
        assert_eq!(phase.training.patience, 5);
        assert_eq!(phase.criterion_a, "cross_entropy");
        assert_eq!(phase.optimizer.kind, "adamw");
        assert_eq!(phase.scheduler.kind, "reduce_on_plateau");
        assert_eq!(phase.training.monitor, Monitor::ValAccMacro);
        assert!(!phase.weighted_random_sampler.enabled);
        assert!(phase.weighted_random_sampler.replacement);
    }

    #[test]
    fn test_run_defaults() {
        let run: RunSpec = serde_yaml::from_str("{}").unwrap();
        assert_eq!(run.batch_size, 32);
        assert_eq!(run.num_workers, 4);
        assert_eq!(run.seed, 42);
        assert_eq!(run.model_name(), "default");
        assert!(run.device.use_cuda);
    }

    #[test]
    fn test_deserialize_phase_blocks() {
        let yaml = r"
name: classifier_only
training:
  num_epochs: 10
  freeze_backbone: true
  monitor: val_loss
optimizer:
  type: sgd
  lr: 0.01
  nesterov: true
scheduler:
  type: step
  step_size: 3
  mode: min
regularization:
  max_norm:
    enabled: true
    thresh: 0.2
  tau_normalization:
    enabled: true
    apply_frequency: 2
  scope: classifier
criterion_b: class_balanced
criterion_b_params:
  gamma: 1.5
first_stage_epochs: 4
weighted_random_sampler:
  enabled: true
  weight_calculation: balanced
  apply_sqrt: true
";
        let phase: PhaseConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(phase.name, "classifier_only");
        assert!(phase.training.freeze_backbone);
        assert_eq!(phase.training.monitor.mode(), PlateauMode::Min);
        assert_eq!(phase.optimizer.kind, "sgd");
        assert!(phase.optimizer.nesterov);
        assert_eq!(phase.optimizer.effective_weight_decay(), 0.0);
        assert_eq!(phase.scheduler.step_size, 3);
        assert!(phase.regularization.max_norm.enabled);
        assert_eq!(phase.regularization.tau_normalization.apply_frequency, 2);
        assert_eq!(phase.regularization.scope, RegularizationScope::Classifier);
        assert_eq!(phase.criterion_b.as_deref(), Some("class_balanced"));
        assert_eq!(phase.criterion_b_params.gamma, Some(1.5));
        assert_eq!(phase.first_stage_epochs, 4);
        assert_eq!(phase.weighted_random_sampler.weight_calculation, WeightCalculation::Balanced);
    }

    #[test]
    fn test_class_remapping_integer_keys() {
        let yaml = "enabled: true\nmapping:\n  5: 4\n  7: 0\nfinal_class_names: [a, b, c, d, e]\n";
        let remap: ClassRemapping = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(remap.mapping.get(&5), Some(&4));
        assert_eq!(remap.final_class_names.unwrap().len(), 5);
    }

    #[test]
    fn test_quoted_booleans_deserialize() {
        let yaml = "enabled: \"true\"\nreplacement: \"false\"\n";
        let sampler: SamplerSpec = serde_yaml::from_str(yaml).unwrap();
        assert!(sampler.enabled);
        assert!(!sampler.replacement);
    }

    #[test]
    fn test_clip_disabled_by_non_positive() {
        let mut params = TrainingParams::default();
        assert_eq!(params.grad_clip(), Some(1.0));
        params.clip_grad_norm = Some(0.0);
        assert_eq!(params.grad_clip(), None);
    }

    #[test]
    fn test_infinite_lp_norm() {
        let spec: MaxNormSpec = serde_yaml::from_str("lp_norm: .inf\n").unwrap();
        assert!(spec.lp_norm.is_infinite());
    }
}
