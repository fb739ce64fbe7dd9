//! Constant-subgraph partitioning.
//!
//! Given a [`GraphModule`], the pass classifies every node as
//! const-foldable or not, extracts the foldable region into a separate
//! subgraph, and rewires the remaining graph to read the region's results
//! from freshly named attributes. The returned [`FoldedModule`] evaluates
//! the constant subgraph once on first use and is observably equivalent to
//! the original module.

pub mod analysis;
pub mod folded;
pub mod split;

pub use analysis::{analyze, ConstAnalysis};
pub use folded::FoldedModule;
pub use split::{split, FoldResult};

use crate::{error::GraphError, module::GraphModule};

/// Splits `module` into constant and base subgraphs and wraps the result
/// in a lazily materializing [`FoldedModule`].
///
/// Degenerate graphs (nothing to fold, or a node order the analysis cannot
/// trust) come back as a working module with `const_subgraph` absent; that
/// is a normal outcome, not an error.
pub fn split_const_subgraphs(module: &GraphModule) -> Result<FoldedModule, GraphError> {
    let result = split::split(module)?;
    Ok(FoldedModule::new(result))
}
