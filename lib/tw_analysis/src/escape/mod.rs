//! Equivalence-class-based alias/escape analysis.
//!
//! The engine answers, for every expression of every analyzed method,
//! whether the location it denotes can be observed by more than one
//! thread, and whether two expressions may denote the same location.
//! Unification happens on union-find alias nodes ([`alias`]), grouped
//! per method into fixed-shape contexts ([`context`]); the driver
//! ([`EscapeAnalysis`]) runs the interprocedural two-phase fixpoint and
//! the allocation-site consolidation.

pub mod alias;
pub mod context;

mod driver;

pub use alias::{AliasArena, AliasIdx, EntityId, FieldKey};
pub use context::{ContextArena, CtxIdx, CtxSlots};
pub use driver::{EscapeAnalysis, EscapeConfig, Multiplicity};
