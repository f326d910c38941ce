//! Statements and expressions, as closed unions.
//!
//! Bodies are in three-address form: composite expressions (field and
//! array accesses, calls) take their bases and operands from local slots,
//! never from nested expressions.

use crate::methods::MethodRef;
use crate::uids::{FieldUid, SiteUid};
use crate::types::Type;
use std::fmt;

/// A local variable slot of a method body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalId(u16);

impl LocalId {
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl From<u16> for LocalId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Call dispatch kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Interface,
    Special,
    Static,
}

/// A call expression: dispatch kind, static target signature, receiver
/// and argument locals.
#[derive(Debug, Clone)]
pub struct CallExpr {
    pub kind: InvokeKind,
    pub target: MethodRef,
    pub receiver: Option<LocalId>,
    pub args: Vec<LocalId>,
}

impl fmt::Display for CallExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invoke ")?;
        if let Some(recv) = self.receiver {
            write!(f, "{recv}.")?;
        }
        write!(f, "{}(", self.target)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// An expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A local slot read (or, as an assignment target, write).
    Local(LocalId),
    /// The receiver of the enclosing instance method.
    ThisRef,
    /// A declared parameter of the enclosing method.
    ParamRef(usize),
    /// The null reference.
    Null,
    /// Any primitive or string constant.
    Literal,
    /// A static field access.
    StaticFieldRef(FieldUid),
    /// An instance field access through a local base.
    InstanceFieldRef(LocalId, FieldUid),
    /// An array element access through a local base.
    ArrayRef(LocalId),
    /// An object allocation.
    New(SiteUid, Type),
    /// An array allocation.
    NewArray(SiteUid, Type),
    /// A call whose value is used.
    Invoke(CallExpr),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Local(l) => l.fmt(f),
            Self::ThisRef => write!(f, "this"),
            Self::ParamRef(i) => write!(f, "p{i}"),
            Self::Null => write!(f, "null"),
            Self::Literal => write!(f, "<lit>"),
            Self::StaticFieldRef(fld) => write!(f, "static {fld}"),
            Self::InstanceFieldRef(base, fld) => write!(f, "{base}.{fld}"),
            Self::ArrayRef(base) => write!(f, "{base}[*]"),
            Self::New(site, typ) => write!(f, "new {typ} @{site}"),
            Self::NewArray(site, typ) => write!(f, "new {typ} @{site}"),
            Self::Invoke(call) => call.fmt(f),
        }
    }
}

/// A statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// An assignment; the left-hand side is a `Local`, `StaticFieldRef`,
    /// `InstanceFieldRef` or `ArrayRef` expression.
    Assign { lhs: Expr, rhs: Expr },
    /// A call whose value is discarded.
    Invoke(CallExpr),
    /// Method return, with the returned local if any.
    Return(Option<LocalId>),
    /// Exception throw.
    Throw(LocalId),
    /// Monitor acquisition on the given local.
    MonitorEnter(LocalId),
    /// Monitor release on the given local.
    MonitorExit(LocalId),
    /// Conditional branch to a statement index (condition operand kept
    /// abstract; the analyses only need the shape of the control flow).
    If(LocalId, usize),
    /// Unconditional branch to a statement index.
    Goto(usize),
    Nop,
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Assign { lhs, rhs } => write!(f, "{lhs} = {rhs}"),
            Self::Invoke(call) => call.fmt(f),
            Self::Return(None) => write!(f, "return"),
            Self::Return(Some(l)) => write!(f, "return {l}"),
            Self::Throw(l) => write!(f, "throw {l}"),
            Self::MonitorEnter(l) => write!(f, "monitor-enter {l}"),
            Self::MonitorExit(l) => write!(f, "monitor-exit {l}"),
            Self::If(l, target) => write!(f, "if {l} jmp {target}"),
            Self::Goto(target) => write!(f, "goto {target}"),
            Self::Nop => write!(f, "nop"),
        }
    }
}

impl Stmt {
    /// Returns `true` if control never falls through to the next statement.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::Return(_) | Self::Throw(_) | Self::Goto(_))
    }
}
