//! Patch shapes exchanged with the network.

use crate::volume::Shape3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-channel `[C, Z, Y, X]` patch shapes a network consumes and produces.
pub trait NetworkShapes {
    fn inputs_setsz(&self) -> BTreeMap<String, [usize; 4]>;
    fn outputs_setsz(&self) -> BTreeMap<String, [usize; 4]>;
}

/// Fixed patch shapes, e.g. read from the `[network]` table of a sampler config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchShapes {
    #[serde(default)]
    pub inputs: BTreeMap<String, [usize; 4]>,
    #[serde(default)]
    pub outputs: BTreeMap<String, [usize; 4]>,
}

impl PatchShapes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, name: impl Into<String>, shape: [usize; 4]) -> Self {
        self.inputs.insert(name.into(), shape);
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, shape: [usize; 4]) -> Self {
        self.outputs.insert(name.into(), shape);
        self
    }
}

impl NetworkShapes for PatchShapes {
    fn inputs_setsz(&self) -> BTreeMap<String, [usize; 4]> {
        self.inputs.clone()
    }

    fn outputs_setsz(&self) -> BTreeMap<String, [usize; 4]> {
        self.outputs.clone()
    }
}

/// Drops the channel axis of every shape and adds `grow` to each spatial extent.
pub(crate) fn spatial_shapes(
    setsz: BTreeMap<String, [usize; 4]>,
    grow: usize,
) -> BTreeMap<String, Shape3> {
    setsz
        .into_iter()
        .map(|(name, [_, z, y, x])| (name, [z + grow, y + grow, x + grow]))
        .collect()
}
