//! The runtime wrapper around a fold partition: materializes the constant
//! subgraph once, then serves every call from the base subgraph.

use log::debug;

use crate::{error::GraphError, module::GraphModule, tensor::TensorData};

use super::split::FoldResult;

/// A module whose constant subgraph is evaluated once and cached as
/// attributes of the base subgraph.
///
/// The wrapper has two states: unmaterialized and materialized. The
/// transition happens on the first `run` (or an explicit `materialize`)
/// and is one-way and idempotent. When no constant subgraph was extracted
/// there is nothing to materialize and every call goes straight to the
/// base subgraph, which is then equivalent to the original module.
#[derive(Debug, Clone)]
pub struct FoldedModule {
    pub const_subgraph: Option<GraphModule>,
    pub base_subgraph: GraphModule,
    pub const_output_names: Vec<String>,
    materialized: bool,
}

impl FoldedModule {
    pub(crate) fn new(result: FoldResult) -> Self {
        FoldedModule {
            const_subgraph: result.const_subgraph,
            base_subgraph: result.base_subgraph,
            const_output_names: result.const_output_names,
            materialized: false,
        }
    }

    pub fn has_const_subgraph(&self) -> bool {
        self.const_subgraph.is_some()
    }

    /// True once the constant subgraph's outputs are resident as
    /// attributes of the base subgraph.
    pub fn is_materialized(&self) -> bool {
        self.materialized
    }

    /// Evaluates the constant subgraph and installs each output under its
    /// allocated attribute name. Runs at most once; later calls are no-ops.
    ///
    /// The constant subgraph takes no runtime inputs by construction, so
    /// the attribute store alone is enough to evaluate it. Evaluation
    /// errors propagate unchanged.
    pub fn materialize(&mut self) -> Result<(), GraphError> {
        if self.materialized {
            return Ok(());
        }
        if let Some(const_module) = &self.const_subgraph {
            let outputs = const_module.run(&[])?;
            if outputs.len() != self.const_output_names.len() {
                return Err(GraphError::InvariantViolation(format!(
                    "const subgraph produced {} outputs for {} folded attributes",
                    outputs.len(),
                    self.const_output_names.len()
                )));
            }
            for (name, value) in self.const_output_names.iter().zip(outputs) {
                debug!("materialized folded attribute {name}");
                self.base_subgraph.attrs.insert(name.clone(), value);
            }
        }
        self.materialized = true;
        Ok(())
    }

    /// Runs the module. Same positional input contract as the original
    /// module; the first call materializes the folded attributes.
    pub fn run(&mut self, inputs: &[TensorData]) -> Result<Vec<TensorData>, GraphError> {
        self.materialize()?;
        self.base_subgraph.run(inputs)
    }
}
