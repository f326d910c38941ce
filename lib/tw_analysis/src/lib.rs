//! This crate provides the whole-program analysis algorithms of the
//! `ThreadWorks` project.

pub mod blocks;
pub mod callgraph;
pub mod errors;
pub mod escape;
pub mod stats;
pub mod threadgraph;
pub mod unionfind;

use crate::callgraph::CallGraph;
use crate::errors::AnalysisResult;
use crate::escape::{EscapeAnalysis, EscapeConfig};
use crate::threadgraph::ThreadGraph;
use tw_model::Program;

/// Runs the full escape analysis pipeline: two-phase fixpoint then
/// allocation-site consolidation.
pub fn escape_analysis(
    program: &Program,
    callgraph: &CallGraph,
    threads: &ThreadGraph,
    config: EscapeConfig,
) -> AnalysisResult<EscapeAnalysis> {
    let mut analysis = EscapeAnalysis::new(config);
    analysis.execute(program, callgraph)?;
    analysis.consolidate(program, callgraph, threads)?;
    Ok(analysis)
}
