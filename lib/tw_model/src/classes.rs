use crate::uids::{ClassUid, FieldUid, MethodUid};
use std::fmt;

/// A class definition.
///
/// The `is_thread` marker records the front end's knowledge that
/// instances of this class are executable thread bodies (it extends
/// `java/lang/Thread` or implements `java/lang/Runnable`); the analyses
/// never re-derive this from the hierarchy themselves.
#[derive(Debug, Clone)]
pub struct Class {
    uid: ClassUid,
    name: String,
    super_name: Option<String>,
    is_thread: bool,
    fields: Vec<FieldUid>,
    methods: Vec<MethodUid>,
}

impl Class {
    pub(crate) fn new(
        uid: ClassUid,
        name: String,
        super_name: Option<String>,
        is_thread: bool,
    ) -> Self {
        Self {
            uid,
            name,
            super_name,
            is_thread,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    #[inline]
    pub fn uid(&self) -> ClassUid {
        self.uid
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn super_name(&self) -> Option<&str> {
        self.super_name.as_deref()
    }

    #[inline]
    #[must_use]
    pub const fn is_thread(&self) -> bool {
        self.is_thread
    }

    pub fn iter_fields(&self) -> impl Iterator<Item = FieldUid> + '_ {
        self.fields.iter().copied()
    }

    pub fn iter_methods(&self) -> impl Iterator<Item = MethodUid> + '_ {
        self.methods.iter().copied()
    }

    pub(crate) fn push_field(&mut self, field: FieldUid) {
        self.fields.push(field);
    }

    pub(crate) fn push_method(&mut self, method: MethodUid) {
        self.methods.push(method);
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
