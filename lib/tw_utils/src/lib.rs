//! This crate provides the small cross-crates utilities of the
//! `ThreadWorks` project: the work bag (worklist) family that drives the
//! analysis fixpoints, and the tuple canonicalizers that let analyses use
//! value-equality tuples as cheap map keys.

pub mod canon;
pub mod errors;
pub mod workbag;
