//! # `ThreadWorks`
//!
//! `threadworks` is the main crate of the `ThreadWorks` static analysis
//! project. The project is subdivided into multiple crates, `threadworks`
//! acts as entry point by reexporting important structs and functions from
//! those sub-crates. Most of the reexports are done within the
//! [`threadworks::prelude`](prelude) namespace.
//!
//! ## Library basics
//!
//! A front end (class-file reader, IR importer) registers the analyzed
//! classes, fields, methods and bodies into a [`prelude::Program`], then
//! the analyses consume it:
//!
//! ```rust
//! use threadworks::prelude::*;
//!
//! let mut program = Program::new();
//! let class = program.register_class("App", None, false)?;
//! program.register_method(
//!     class,
//!     "main",
//!     MethodFlags::PUBLIC | MethodFlags::STATIC,
//!     vec![],
//!     Type::Void,
//! )?;
//!
//! let callgraph = CallGraph::build(&program)?;
//! let threads = ThreadGraph::build(&program);
//! let analysis = escape_analysis(&program, &callgraph, &threads, EscapeConfig::default())?;
//! println!("{}", analysis.stats());
//! # Ok::<(), TwError>(())
//! ```
//!
//! ## Sub-crates
//!
//! The `ThreadWorks` project is divided into several crates. Some of them
//! are (completely or partially) re-exported as parts of [`prelude`], but
//! some features may be accessible only by importing a given sub-crate.
//! Here is a list of those sub-crates:
//!
//!  - [`tw_model`] contains the definitions, types and basic accessors,
//!    setters and constructors for the program representation that is
//!    analyzed,
//!  - [`tw_analysis`] contains all the analysis algorithms and relies
//!    heavily on the previously cited crate,
//!  - [`tw_utils`] contains the small utilities all the other crates can
//!    benefit from.

mod errors;

pub use tw_analysis as analysis;
pub use tw_model as model;
pub use tw_utils as utils;

pub mod prelude {
    pub use crate::errors::{TwError, TwResult};
    pub use tw_analysis::blocks::{BlockGraph, BlockManager};
    pub use tw_analysis::callgraph::CallGraph;
    pub use tw_analysis::escape::{
        EscapeAnalysis, EscapeConfig, Multiplicity,
    };
    pub use tw_analysis::escape_analysis;
    pub use tw_analysis::stats::EscapeStats;
    pub use tw_analysis::threadgraph::ThreadGraph;
    pub use tw_model::{
        Body, CallExpr, Class, Expr, Field, InvokeKind, LocalId, Method, MethodFlags, MethodRef,
        Program, Stmt, Type,
    };
}
