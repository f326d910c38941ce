//! Association between thread allocation sites and the methods their
//! threads execute.

use std::collections::{BTreeMap, BTreeSet};
use tw_model::{Expr, MethodRef, MethodUid, Program, SiteUid, Stmt, Type};

/// Consumed by consolidation: for each thread allocation site, the
/// run-methods the started thread executes.
#[derive(Debug, Default)]
pub struct ThreadGraph {
    executed: BTreeMap<SiteUid, BTreeSet<MethodUid>>,
}

impl ThreadGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            executed: BTreeMap::new(),
        }
    }

    /// Builds the association over a closed-world program: every thread
    /// class allocation is bound to the `run()` method resolved on the
    /// allocated class.
    #[must_use]
    pub fn build(program: &Program) -> Self {
        let mut tg = Self::new();
        for method in program.iter_methods() {
            let Some(body) = method.body() else {
                continue;
            };
            for stmt in body.statements() {
                let (site, typ) = match stmt {
                    Stmt::Assign {
                        rhs: Expr::New(site, typ),
                        ..
                    } => (*site, typ),
                    _ => continue,
                };
                let Some(class_name) = typ.class_name() else {
                    continue;
                };
                if !program
                    .get_class_by_name(class_name)
                    .is_some_and(|cl| cl.is_thread())
                {
                    continue;
                }
                let run = MethodRef::new(class_name, "run", vec![], Type::Void);
                if let Some(run_method) = program.find_method(&run) {
                    tg.record_executed(site, run_method);
                } else {
                    log::trace!("thread class {class_name} without a run method");
                }
            }
        }
        tg
    }

    pub fn record_executed(&mut self, site: SiteUid, method: MethodUid) {
        self.executed.entry(site).or_default().insert(method);
    }

    pub fn executed_methods(&self, site: SiteUid) -> impl Iterator<Item = MethodUid> + '_ {
        self.executed
            .get(&site)
            .into_iter()
            .flat_map(|methods| methods.iter().copied())
    }

    #[must_use]
    pub fn nb_sites(&self) -> usize {
        self.executed.len()
    }
}
