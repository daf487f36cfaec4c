//! Inheritance-by-merge: one fully resolved [`PhaseConfig`] per phase.
//!
//! The top-level phase blocks form the base. Each phase overlay is deep-merged
//! onto it: mappings merge key by key, scalars and sequences replace, and an
//! explicit `null` drops the key so its default applies.

use super::schema::{PhaseConfig, PHASE_KEYS};
use crate::error::ConfigError;
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// Deep-merge `overlay` onto `base`.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    base_map.remove(&key);
                    continue;
                }
                let nested = value.is_mapping() && base_map.get(&key).is_some_and(Value::is_mapping);
                match base_map.get_mut(&key) {
                    Some(existing) if nested => deep_merge(existing, value),
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Split the top-level phase blocks out of `root`.
pub fn base_phase_blocks(root: &Mapping) -> Mapping {
    let mut base = Mapping::new();
    for &key in PHASE_KEYS {
        let key = Value::from(key);
        if let Some(value) = root.get(&key) {
            // Top-level nulls mean "use the default" as well.
            if !value.is_null() {
                base.insert(key, value.clone());
            }
        }
    }
    base
}

fn overlay_keys(overlay: &Mapping, field: &str, allow: &[&str]) -> Result<Mapping, ConfigError> {
    let mut out = Mapping::new();
    for (key, value) in overlay {
        let name = key.as_str().unwrap_or_default();
        if allow.contains(&name) {
            continue;
        }
        if !PHASE_KEYS.contains(&name) {
            return Err(ConfigError::unknown(format!("{field} key"), name, PHASE_KEYS));
        }
        out.insert(key.clone(), value.clone());
    }
    Ok(out)
}

fn resolve_one(
    base: &Mapping,
    overlay: Mapping,
    name: &str,
    path: &Path,
) -> Result<PhaseConfig, ConfigError> {
    let mut merged = Value::Mapping(base.clone());
    deep_merge(&mut merged, Value::Mapping(overlay));
    let mut phase: PhaseConfig = serde_yaml::from_value(merged).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("phase '{name}': {e}"),
    })?;
    phase.name = name.to_string();
    Ok(phase)
}

/// Resolve the phase list from a raw configuration document.
///
/// With an explicit `phases` list every entry is merged onto the base. Without
/// it, the base is the `main` phase and an enabled `classifier_only_training`
/// block adds a second phase with a frozen backbone.
pub fn resolve_phases(root: &Mapping, path: &Path) -> Result<Vec<PhaseConfig>, ConfigError> {
    let base = base_phase_blocks(root);

    if let Some(phases) = root.get("phases").filter(|v| !v.is_null()) {
        let entries = phases
            .as_sequence()
            .ok_or_else(|| ConfigError::invalid("phases", "expected a list of phase blocks"))?;
        if entries.is_empty() {
            return Err(ConfigError::invalid("phases", "at least one phase is required"));
        }
        let mut resolved = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            let field = format!("phases[{idx}]");
            let map = entry
                .as_mapping()
                .ok_or_else(|| ConfigError::invalid(&field, "expected a mapping"))?;
            let name = map
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("phase{idx}"));
            let overlay = overlay_keys(map, &field, &["name"])?;
            resolved.push(resolve_one(&base, overlay, &name, path)?);
        }
        return Ok(resolved);
    }

    let mut resolved = vec![resolve_one(&base, Mapping::new(), "main", path)?];

    if let Some(block) = root.get("classifier_only_training").and_then(Value::as_mapping) {
        let enabled = match block.get("enabled") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };
        if enabled {
            let overlay = overlay_keys(block, "classifier_only_training", &["enabled"])?;
            let mut phase = resolve_one(&base, overlay, "classifier_only", path)?;
            phase.training.freeze_backbone = true;
            resolved.push(phase);
        }
    }
    Ok(resolved)
}
