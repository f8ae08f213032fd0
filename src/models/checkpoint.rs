//! Combining pretrained encoder weights with a trained checkpoint.

use anyhow::Result;
use candle_core::{DType, Device, Shape, Tensor};
use candle_nn::var_builder::SimpleBackend;
use candle_nn::init::Init;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const ENCODER_PREFIX: &str = "bert.";
pub const HEAD_WEIGHT: &str = "out.weight";
pub const HEAD_BIAS: &str = "out.bias";

/// Older BERT exports name LayerNorm parameters `gamma`/`beta`; candle expects
/// `weight`/`bias`.
pub fn normalize_name(name: &str) -> String {
    if let Some(stem) = name.strip_suffix(".gamma") {
        format!("{stem}.weight")
    } else if let Some(stem) = name.strip_suffix(".beta") {
        format!("{stem}.bias")
    } else {
        name.to_string()
    }
}

/// Overlays `trained` on top of `pretrained`.
///
/// Pretrained names are moved under the `bert.` prefix when they are bare
/// encoder names, pretraining heads (`cls.*`) are dropped. Checkpoint tensors
/// always win.
pub fn merge(
    pretrained: HashMap<String, Tensor>,
    trained: HashMap<String, Tensor>,
) -> HashMap<String, Tensor> {
    let mut tensors: HashMap<String, Tensor> = pretrained
        .into_iter()
        .filter(|(name, _)| !name.starts_with("cls."))
        .map(|(name, tensor)| {
            let name = normalize_name(&name);
            if name.starts_with(ENCODER_PREFIX) {
                (name, tensor)
            } else {
                (format!("{ENCODER_PREFIX}{name}"), tensor)
            }
        })
        .collect();

    let overridden = trained
        .into_iter()
        .map(|(name, tensor)| tensors.insert(normalize_name(&name), tensor))
        .filter(Option::is_some)
        .count();

    tracing::debug!(tensors = tensors.len(), overridden, "merged encoder and checkpoint weights");
    tensors
}

/// Checks the checkpoint carries a head projecting `hidden_size` to
/// `num_labels` scores.
pub fn check_head(
    trained: &HashMap<String, Tensor>,
    hidden_size: usize,
    num_labels: usize,
) -> Result<()> {
    let weight = trained
        .get(HEAD_WEIGHT)
        .ok_or_else(|| anyhow::anyhow!("checkpoint has no `{HEAD_WEIGHT}` tensor"))?;
    anyhow::ensure!(
        weight.dims() == [num_labels, hidden_size],
        "shape mismatch for `{HEAD_WEIGHT}`: expected {:?}, got {:?}",
        [num_labels, hidden_size],
        weight.dims()
    );

    let bias = trained
        .get(HEAD_BIAS)
        .ok_or_else(|| anyhow::anyhow!("checkpoint has no `{HEAD_BIAS}` tensor"))?;
    anyhow::ensure!(
        bias.dims() == [num_labels],
        "shape mismatch for `{HEAD_BIAS}`: expected {:?}, got {:?}",
        [num_labels],
        bias.dims()
    );

    Ok(())
}

/// Non-parameter buffers that PyTorch state dicts may carry.
fn is_buffer(name: &str) -> bool {
    name.ends_with(".position_ids")
}

pub type RequestedNames = Arc<Mutex<HashSet<String>>>;

/// A tensor map backend for `VarBuilder` that records every name the model
/// loads from it.
pub struct TrackedTensors {
    tensors: HashMap<String, Tensor>,
    requested: RequestedNames,
}

impl TrackedTensors {
    pub fn new(tensors: HashMap<String, Tensor>) -> (Self, RequestedNames) {
        let requested = RequestedNames::default();
        let backend = Self {
            tensors,
            requested: requested.clone(),
        };
        (backend, requested)
    }

    fn record(&self, name: &str) {
        if let Ok(mut requested) = self.requested.lock() {
            requested.insert(name.to_string());
        }
    }
}

impl SimpleBackend for TrackedTensors {
    fn get(
        &self,
        s: Shape,
        name: &str,
        h: Init,
        dtype: DType,
        dev: &Device,
    ) -> candle_core::Result<Tensor> {
        let tensor = SimpleBackend::get(&self.tensors, s, name, h, dtype, dev)?;
        self.record(name);
        Ok(tensor)
    }

    fn get_unchecked(&self, name: &str, dtype: DType, dev: &Device) -> candle_core::Result<Tensor> {
        let tensor = SimpleBackend::get_unchecked(&self.tensors, name, dtype, dev)?;
        self.record(name);
        Ok(tensor)
    }

    fn contains_tensor(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }
}

/// Compares the checkpoint's tensor names with the names the model loaded.
///
/// A checkpoint tensor the model never asked for always fails. With `strict`
/// every loaded tensor must also come from the checkpoint rather than the
/// pretrained weights.
pub fn check_coverage(
    trained: &HashSet<String>,
    requested: &HashSet<String>,
    strict: bool,
) -> Result<()> {
    let mut unexpected: Vec<&str> = trained
        .iter()
        .filter(|name| !requested.contains(*name) && !is_buffer(name))
        .map(String::as_str)
        .collect();
    unexpected.sort_unstable();
    anyhow::ensure!(
        unexpected.is_empty(),
        "checkpoint has {} tensors the model does not use: {}",
        unexpected.len(),
        unexpected.join(", ")
    );

    if strict {
        let mut missing: Vec<&str> = requested
            .iter()
            .filter(|name| !trained.contains(*name))
            .map(String::as_str)
            .collect();
        missing.sort_unstable();
        anyhow::ensure!(
            missing.is_empty(),
            "checkpoint is missing {} tensors: {}",
            missing.len(),
            missing.join(", ")
        );
    }

    Ok(())
}
