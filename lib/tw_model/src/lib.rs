//! Program model of the `ThreadWorks` project: classes, fields, methods
//! and their bodies, expressed as closed statement/expression unions over
//! typed local slots.
//!
//! The model is the input handed to the analyses; it carries no analysis
//! state of its own. Front ends (class-file readers, IR importers) build a
//! [`Program`] through the registration API and the analyses consume it
//! read-only.

mod classes;
mod fields;
mod methods;
mod program;
mod stmts;
mod types;
mod uids;

pub mod errors;

pub use classes::Class;
pub use fields::Field;
pub use methods::{Body, Method, MethodFlags, MethodRef};
pub use program::Program;
pub use stmts::{CallExpr, Expr, InvokeKind, LocalId, Stmt};
pub use types::{PrimType, Type};
pub use uids::{ClassUid, FieldUid, MethodUid, ProgramCounters, SiteUid};
