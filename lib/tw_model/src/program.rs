use crate::classes::Class;
use crate::errors::{ModelError, ModelResult};
use crate::fields::Field;
use crate::methods::{Body, Method, MethodFlags, MethodRef};
use crate::types::Type;
use crate::uids::{ClassUid, FieldUid, MethodUid, ProgramCounters, SiteUid};
use std::collections::BTreeMap;

/// The closed-world program container handed to the analyses.
///
/// Front ends register classes, then their fields and methods, then the
/// method bodies. Uids index the registration order and stay valid for
/// the container's lifetime.
#[derive(Debug, Default)]
pub struct Program {
    classes: Vec<Class>,
    methods: Vec<Method>,
    fields: Vec<Field>,
    class_ids: BTreeMap<String, ClassUid>,
    counters: ProgramCounters,
}

impl Program {
    #[must_use]
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            class_ids: BTreeMap::new(),
            counters: ProgramCounters::new(),
        }
    }

    pub fn register_class(
        &mut self,
        name: impl Into<String>,
        super_name: Option<&str>,
        is_thread: bool,
    ) -> ModelResult<ClassUid> {
        let name = name.into();
        if self.class_ids.contains_key(&name) {
            return Err(ModelError::DuplicateClass(name));
        }
        let uid = self.counters.new_class_uid();
        self.class_ids.insert(name.clone(), uid);
        self.classes.push(Class::new(
            uid,
            name,
            super_name.map(ToString::to_string),
            is_thread,
        ));
        Ok(uid)
    }

    pub fn register_field(
        &mut self,
        definer: ClassUid,
        name: impl Into<String>,
        typ: Type,
        is_static: bool,
    ) -> ModelResult<FieldUid> {
        let uid = self.counters.new_field_uid();
        self.fields
            .push(Field::new(uid, definer, name.into(), typ, is_static));
        self.class_mut(definer)?.push_field(uid);
        Ok(uid)
    }

    pub fn register_method(
        &mut self,
        definer: ClassUid,
        name: impl Into<String>,
        flags: MethodFlags,
        parameters_types: Vec<Type>,
        return_type: Type,
    ) -> ModelResult<MethodUid> {
        let class_name = self.class(definer)?.name().to_string();
        let uid = self.counters.new_method_uid();
        let descriptor = MethodRef::new(class_name, name, parameters_types, return_type);
        self.methods
            .push(Method::new(uid, definer, descriptor, flags));
        self.class_mut(definer)?.push_method(uid);
        Ok(uid)
    }

    pub fn set_body(&mut self, method: MethodUid, body: Body) -> ModelResult<()> {
        self.methods
            .get_mut(method.idx())
            .ok_or_else(|| ModelError::MethodNotFound(format!("{method}")))?
            .set_body(body);
        Ok(())
    }

    /// Allocates a fresh allocation-site uid, to be embedded in a `New` or
    /// `NewArray` expression.
    pub fn new_site(&mut self) -> SiteUid {
        self.counters.new_site_uid()
    }

    pub fn class(&self, uid: ClassUid) -> ModelResult<&Class> {
        self.classes
            .get(uid.idx())
            .ok_or_else(|| ModelError::ClassNotFound(format!("{uid}")))
    }

    fn class_mut(&mut self, uid: ClassUid) -> ModelResult<&mut Class> {
        self.classes
            .get_mut(uid.idx())
            .ok_or_else(|| ModelError::ClassNotFound(format!("{uid}")))
    }

    pub fn method(&self, uid: MethodUid) -> ModelResult<&Method> {
        self.methods
            .get(uid.idx())
            .ok_or_else(|| ModelError::MethodNotFound(format!("{uid}")))
    }

    pub fn field(&self, uid: FieldUid) -> ModelResult<&Field> {
        self.fields
            .get(uid.idx())
            .ok_or_else(|| ModelError::FieldNotFound(format!("{uid}")))
    }

    #[must_use]
    pub fn get_class_by_name(&self, name: &str) -> Option<&Class> {
        self.class_ids
            .get(name)
            .and_then(|uid| self.classes.get(uid.idx()))
    }

    pub fn iter_classes(&self) -> impl Iterator<Item = &Class> {
        self.classes.iter()
    }

    pub fn iter_methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter()
    }

    pub fn iter_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Resolves a method reference against its static target class and,
    /// when not declared there, the superclass chain.
    #[must_use]
    pub fn find_method(&self, target: &MethodRef) -> Option<MethodUid> {
        let mut class = self.get_class_by_name(target.class_name())?;
        loop {
            for uid in class.iter_methods() {
                let method = &self.methods[uid.idx()];
                if method.descriptor().same_signature(target) {
                    return Some(uid);
                }
            }
            class = self.get_class_by_name(class.super_name()?)?;
        }
    }

    /// Returns `true` if `class` is `ancestor` or inherits from it.
    #[must_use]
    pub fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        let mut current = self.get_class_by_name(class);
        while let Some(cl) = current {
            if cl.name() == ancestor {
                return true;
            }
            current = cl.super_name().and_then(|s| self.get_class_by_name(s));
        }
        false
    }

    /// All methods overriding (or defining) the given signature in
    /// subclasses of its static target class.
    #[must_use]
    pub fn implementations_of(&self, target: &MethodRef) -> Vec<MethodUid> {
        let mut impls = Vec::new();
        for class in &self.classes {
            if !self.is_subclass_of(class.name(), target.class_name()) {
                continue;
            }
            for uid in class.iter_methods() {
                if self.methods[uid.idx()].descriptor().same_signature(target) {
                    impls.push(uid);
                }
            }
        }
        impls
    }

    #[must_use]
    pub fn nb_classes(&self) -> usize {
        self.counters.nb_classes()
    }

    #[must_use]
    pub fn nb_methods(&self) -> usize {
        self.counters.nb_methods()
    }

    #[must_use]
    pub fn nb_fields(&self) -> usize {
        self.counters.nb_fields()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_resolution_walks_super_chain() {
        let mut program = Program::new();
        let base = program.register_class("Base", None, false).unwrap();
        let derived = program
            .register_class("Derived", Some("Base"), false)
            .unwrap();
        let m = program
            .register_method(base, "work", MethodFlags::PUBLIC, vec![], Type::Void)
            .unwrap();
        let _ = derived;

        let target = MethodRef::new("Derived", "work", vec![], Type::Void);
        assert_eq!(program.find_method(&target), Some(m));

        let missing = MethodRef::new("Derived", "absent", vec![], Type::Void);
        assert_eq!(program.find_method(&missing), None);
    }

    #[test]
    fn implementations_include_overrides() {
        let mut program = Program::new();
        let base = program.register_class("Base", None, false).unwrap();
        let derived = program
            .register_class("Derived", Some("Base"), false)
            .unwrap();
        let m1 = program
            .register_method(base, "work", MethodFlags::PUBLIC, vec![], Type::Void)
            .unwrap();
        let m2 = program
            .register_method(derived, "work", MethodFlags::PUBLIC, vec![], Type::Void)
            .unwrap();

        let target = MethodRef::new("Base", "work", vec![], Type::Void);
        let impls = program.implementations_of(&target);
        assert!(impls.contains(&m1));
        assert!(impls.contains(&m2));
    }

    #[test]
    fn duplicate_class_is_rejected() {
        let mut program = Program::new();
        program.register_class("A", None, false).unwrap();
        assert!(program.register_class("A", None, false).is_err());
    }
}
