//! k-limited call-string context manager.
//!
//! `Context` is a fixed-capacity tuple of call-site identifiers; `NEW` is
//! the all-null tuple and `gen(ctx, site)` shifts left and appends `site`.
//! `ContextCache` interns contexts behind small integer ids the way
//! `rustanlys-rupta/src/mir/context.rs`'s `ContextCache` interns its own
//! context values, so `ctx_table[fn][ctx]` lookups are a cheap
//! integer-keyed map rather than repeated tuple comparison.

use std::collections::HashMap;

use crate::ssa::CallSiteId;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ContextId(pub u32);

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Context {
    /// Newest call site first, truncated to at most `k` elements.
    elems: Vec<CallSiteId>,
}

impl Context {
    /// The all-null tuple.
    pub fn new_empty() -> Context {
        Context { elems: Vec::new() }
    }

    /// `gen(ctx, site)`: shift left and append `site`, keeping at most `k`
    /// elements (newest first).
    pub fn generate(&self, site: CallSiteId, k: usize) -> Context {
        if k == 0 {
            return Context::new_empty();
        }
        let mut elems = Vec::with_capacity(k);
        elems.push(site);
        let keep = k.saturating_sub(1).min(self.elems.len());
        elems.extend_from_slice(&self.elems[..keep]);
        Context { elems }
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }
}

/// Interns `Context` values behind small integer ids.
#[derive(Default)]
pub struct ContextCache {
    contexts: Vec<Context>,
    index: HashMap<Context, ContextId>,
    new_id: Option<ContextId>,
}

impl ContextCache {
    pub fn new() -> Self {
        let mut cache = ContextCache {
            contexts: Vec::new(),
            index: HashMap::new(),
            new_id: None,
        };
        let id = cache.intern(Context::new_empty());
        cache.new_id = Some(id);
        cache
    }

    /// The canonical id of the all-null context, `NEW`.
    pub fn new_context_id(&self) -> ContextId {
        self.new_id.expect("ContextCache::new() always interns NEW")
    }

    pub fn intern(&mut self, ctx: Context) -> ContextId {
        if let Some(id) = self.index.get(&ctx) {
            return *id;
        }
        let id = ContextId(self.contexts.len() as u32);
        self.contexts.push(ctx.clone());
        self.index.insert(ctx, id);
        id
    }

    pub fn get(&self, id: ContextId) -> &Context {
        &self.contexts[id.0 as usize]
    }
}
