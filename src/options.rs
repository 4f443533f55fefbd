//! Analysis configuration. A plain struct built by the caller — no CLI
//! parsing, no environment variables; that belongs to the out-of-scope
//! external driver.

use crate::ssa::FuncId;

/// Hook deciding whether a function is analyzed context-sensitively.
/// Default: always-true. Exists so a driver can mask heavy or unbounded
/// callees.
pub type ContextPolicy = std::rc::Rc<dyn Fn(FuncId) -> bool>;

#[derive(Clone)]
pub struct AnalysisOptions {
    /// Call-string depth `k`, `level >= 1`. Default 1.
    pub level: usize,
    /// `context_policy(fn)`; default always-true.
    pub context_policy: ContextPolicy,
    /// Entry functions supplied directly by the driver, merged with the
    /// functions discovered via entry-package conventions.
    pub explicit_entries: Vec<FuncId>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            level: 1,
            context_policy: std::rc::Rc::new(|_| true),
            explicit_entries: Vec::new(),
        }
    }
}

impl AnalysisOptions {
    pub fn with_level(mut self, level: usize) -> Self {
        assert!(level >= 1, "call-string depth must be at least 1");
        self.level = level;
        self
    }

    pub fn with_context_policy(mut self, policy: ContextPolicy) -> Self {
        self.context_policy = policy;
        self
    }

    pub fn with_explicit_entries(mut self, entries: Vec<FuncId>) -> Self {
        self.explicit_entries = entries;
        self
    }
}
