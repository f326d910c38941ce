use crate::types::Type;
use crate::uids::{ClassUid, FieldUid};
use std::fmt;

/// A field definition.
#[derive(Debug, Clone)]
pub struct Field {
    uid: FieldUid,
    definer: ClassUid,
    name: String,
    typ: Type,
    is_static: bool,
}

impl Field {
    pub(crate) fn new(
        uid: FieldUid,
        definer: ClassUid,
        name: String,
        typ: Type,
        is_static: bool,
    ) -> Self {
        Self {
            uid,
            definer,
            name,
            typ,
            is_static,
        }
    }

    #[inline]
    pub fn uid(&self) -> FieldUid {
        self.uid
    }

    #[inline]
    pub fn definer(&self) -> ClassUid {
        self.definer
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn type_(&self) -> &Type {
        &self.typ
    }

    #[inline]
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.is_static
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.typ)
    }
}
