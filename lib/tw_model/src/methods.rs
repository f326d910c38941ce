use crate::errors::{ModelError, ModelResult};
use crate::stmts::{LocalId, Stmt};
use crate::types::Type;
use crate::uids::{ClassUid, MethodUid};
use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Method access and property flags.
    pub struct MethodFlags: u32 {
        const PUBLIC = 0x1;
        const PRIVATE = 0x2;
        const PROTECTED = 0x4;
        const STATIC = 0x8;
        const FINAL = 0x10;
        const SYNCHRONIZED = 0x20;
        const NATIVE = 0x100;
        const ABSTRACT = 0x400;
    }
}

/// A wrapper to cache signature information of a method and to allow
/// deriving of eq and ord traits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodRef {
    class_name: String,
    name: String,
    parameters_types: Vec<Type>,
    return_type: Type,
}

impl MethodRef {
    #[must_use]
    pub fn new(
        class_name: impl Into<String>,
        name: impl Into<String>,
        parameters_types: Vec<Type>,
        return_type: Type,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            parameters_types,
            return_type,
        }
    }

    #[inline]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn parameters_types(&self) -> &[Type] {
        &self.parameters_types
    }

    #[inline]
    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    /// Same name and same parameter/return types, disregarding the
    /// defining class (override compatibility).
    #[must_use]
    pub fn same_signature(&self, other: &Self) -> bool {
        self.name == other.name
            && self.parameters_types == other.parameters_types
            && self.return_type == other.return_type
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parameters = self
            .parameters_types
            .iter()
            .map(|t| format!("{t}"))
            .collect::<String>();
        write!(
            f,
            "{}->{}({}){}",
            self.class_name, self.name, parameters, self.return_type
        )
    }
}

/// A method body: typed local slots and a statement list.
///
/// Parameters are not locals; statements refer to them through
/// [`crate::Expr::ParamRef`]. Branch statements target statement indices.
#[derive(Debug, Clone, Default)]
pub struct Body {
    locals: Vec<Type>,
    stmts: Vec<Stmt>,
}

impl Body {
    #[must_use]
    pub fn new(locals: Vec<Type>, stmts: Vec<Stmt>) -> Self {
        Self { locals, stmts }
    }

    #[inline]
    pub fn statements(&self) -> &[Stmt] {
        &self.stmts
    }

    #[inline]
    pub fn nb_locals(&self) -> usize {
        self.locals.len()
    }

    pub fn local_type(&self, local: LocalId) -> ModelResult<&Type> {
        self.locals
            .get(local.value() as usize)
            .ok_or_else(|| ModelError::OutOfBoundsLocal(format!("{local}")))
    }
}

/// The enriched method definition.
#[derive(Debug, Clone)]
pub struct Method {
    uid: MethodUid,
    definer: ClassUid,
    descriptor: MethodRef,
    flags: MethodFlags,
    body: Option<Body>,
}

impl Method {
    pub(crate) fn new(
        uid: MethodUid,
        definer: ClassUid,
        descriptor: MethodRef,
        flags: MethodFlags,
    ) -> Self {
        Self {
            uid,
            definer,
            descriptor,
            flags,
            body: None,
        }
    }

    #[inline]
    pub fn uid(&self) -> MethodUid {
        self.uid
    }

    #[inline]
    pub fn definer(&self) -> ClassUid {
        self.definer
    }

    #[inline]
    pub fn descriptor(&self) -> &MethodRef {
        &self.descriptor
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    #[inline]
    pub fn return_type(&self) -> &Type {
        self.descriptor.return_type()
    }

    #[inline]
    pub fn parameters_types(&self) -> &[Type] {
        self.descriptor.parameters_types()
    }

    #[must_use]
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub(crate) fn set_body(&mut self, body: Body) {
        self.body = Some(body);
    }

    #[inline]
    #[must_use]
    pub const fn is_public(&self) -> bool {
        self.flags.contains(MethodFlags::PUBLIC)
    }

    #[inline]
    #[must_use]
    pub const fn is_private(&self) -> bool {
        self.flags.contains(MethodFlags::PRIVATE)
    }

    #[inline]
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    #[inline]
    #[must_use]
    pub const fn is_synchronized(&self) -> bool {
        self.flags.contains(MethodFlags::SYNCHRONIZED)
    }

    #[inline]
    #[must_use]
    pub const fn is_native(&self) -> bool {
        self.flags.contains(MethodFlags::NATIVE)
    }

    #[inline]
    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        self.flags.contains(MethodFlags::ABSTRACT)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.descriptor.fmt(f)
    }
}
