//! Summary counters of a finished analysis run.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct EscapeStats {
    pub nb_alias_classes: usize,
    pub nb_shared_classes: usize,
    pub nb_global_classes: usize,
    pub nb_contexts: usize,
    pub nb_call_sites: usize,
    pub nb_thread_sites: usize,
    pub nb_multi_executed_sites: usize,
}

impl fmt::Display for EscapeStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "alias classes:        {}", self.nb_alias_classes)?;
        writeln!(f, "  shared:             {}", self.nb_shared_classes)?;
        writeln!(f, "  global:             {}", self.nb_global_classes)?;
        writeln!(f, "method contexts:      {}", self.nb_contexts)?;
        writeln!(f, "call sites:           {}", self.nb_call_sites)?;
        writeln!(f, "thread alloc sites:   {}", self.nb_thread_sites)?;
        write!(f, "  multi-executed:     {}", self.nb_multi_executed_sites)
    }
}
