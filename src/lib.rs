// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Whole-program, inclusion-based (Andersen-style) pointer analysis: a
//! field-sensitive, flow-insensitive, on-the-fly constraint solver with
//! k-limited call-string context sensitivity over an opaque SSA program
//! abstraction (`ssa::Program`). `analyze` is the only public entry point;
//! everything else is the machinery it drives.

#![allow(clippy::too_many_arguments)]

pub mod call_graph;
pub mod context;
pub mod error;
pub mod flatten;
pub mod gen;
pub mod options;
pub mod pag;
pub mod rule;
pub mod solver;
pub mod ssa;
pub mod types;
pub mod util;

use std::panic::AssertUnwindSafe;

pub use call_graph::CallGraph;
pub use error::{AnalysisError, Result};
pub use options::AnalysisOptions;
pub use ssa::Program;

use ssa::{FuncId, MAIN_PACKAGE};

/// Runs the analysis to a fixpoint and returns the resulting call graph.
///
/// Entry functions are the union of the program's own entry-package
/// functions (`main`/`init` of the main package; every exported top-level
/// function, exported method, and initializer of every other package) and
/// `options.explicit_entries`, supplied by the driver.
///
/// Any internal solver panic (an invariant violation) is caught at this
/// boundary and reported as `AnalysisError::Internal` rather than
/// unwinding into the caller.
pub fn analyze(program: &dyn Program, options: AnalysisOptions) -> Result<CallGraph> {
    error::catch_fatal(AssertUnwindSafe(|| {
        let mut entries = discover_entries(program);
        entries.extend(options.explicit_entries.iter().copied());
        entries.sort_by_key(|f| f.0);
        entries.dedup();
        if entries.is_empty() {
            return Err(AnalysisError::Config(
                "no entry functions discovered or supplied".into(),
            ));
        }

        let mut engine = solver::Engine::new(program, options);
        let new_ctx = engine.new_context_id();
        for &f in &entries {
            engine.func_object(f, new_ctx);
        }
        engine.run_to_fixpoint();

        let mut cg = engine.finish()?;
        cg.add_entries(entries);
        Ok(cg)
    }))
}

/// Entry-package convention: the main package contributes its `main` and
/// `init` only; every other package contributes every exported top-level
/// function, exported method, and initializer (grounded on
/// `original_source/solve.go`'s `addReachable`, generalized from "the main
/// package's `main`/`init`" to every package per the driver-agnostic
/// entry-discovery convention).
fn discover_entries(program: &dyn Program) -> Vec<FuncId> {
    let mut entries = Vec::new();
    for (i, f) in program.functions().iter().enumerate() {
        if f.is_synthetic() || f.is_generic_without_args() {
            continue;
        }
        let id = FuncId(i as u32);
        let name = f.name();
        if f.package() == MAIN_PACKAGE {
            if name == "main" || name == "init" {
                entries.push(id);
            }
        } else if name == "init" || is_exported(name) {
            entries.push(id);
        }
    }
    entries
}

/// Go-style export convention: an identifier is exported iff its first
/// letter is uppercase.
fn is_exported(name: &str) -> bool {
    name.chars().next().map(char::is_uppercase).unwrap_or(false)
}
