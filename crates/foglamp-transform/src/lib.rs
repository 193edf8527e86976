//! The `applyFilter`/`filterRule` transform stage: a user-supplied JQ-style
//! expression evaluated over a batch of readings as a JSON array.
//!
//! Per `spec.md` §9 the filter "must be pure and total over valid input"
//! and evaluated "in a sandboxed expression engine, not by string-eval".
//! `jaq` (a pure-Rust jq implementation) is the engine: no example repo in
//! the retrieval pack implements a JQ-style engine of its own, so this is a
//! deliberate, documented exception to "reuse the teacher's stack" (see
//! `DESIGN.md`) rather than a hand-rolled expression evaluator, which the
//! "no string-eval" constraint rules out outright.

use jaq_core::load::{Arena, File, Loader};
use jaq_core::{Compiler, Ctx, Native, RcIter};
use jaq_json::Val;
use serde_json::Value;

use foglamp_core::TransformError;

/// A compiled `filterRule`, reusable across every batch on a stream.
pub struct FilterEngine {
    filter: jaq_core::Filter<Native<Val>>,
}

impl FilterEngine {
    /// Compiles `filter_rule` once. Compilation errors surface immediately
    /// so a malformed `filterRule` fails the Sending Process's startup
    /// rather than every batch at runtime.
    pub fn compile(filter_rule: &str) -> Result<Self, TransformError> {
        let program = File {
            code: filter_rule,
            path: (),
        };
        let loader = Loader::new(jaq_std::defs().chain(jaq_json::defs()));
        let arena = Arena::default();
        let modules = loader
            .load(&arena, program)
            .map_err(|errs| TransformError(format!("{errs:?}")))?;

        let filter = Compiler::default()
            .with_funs(jaq_std::funs().chain(jaq_json::funs()))
            .compile(modules)
            .map_err(|errs| TransformError(format!("{errs:?}")))?;

        Ok(Self { filter })
    }

    /// Applies the compiled filter to `input`, a JSON value (typically an
    /// array of reading objects), returning the transformed value.
    ///
    /// A filter that errors or produces no output is surfaced as
    /// `TransformError` — the caller (the fetcher) treats this the same as
    /// a loader failure: audit, back off, retry.
    pub fn apply(&self, input: Value) -> Result<Value, TransformError> {
        let inputs = RcIter::new(core::iter::empty());
        let ctx = Ctx::new([], &inputs);
        let mut outputs = self.filter.run((ctx, Val::from(input)));

        let first = outputs
            .next()
            .ok_or_else(|| TransformError("filter produced no output".to_string()))?
            .map_err(|e| TransformError(e.to_string()))?;

        Ok(Value::from(first))
    }
}
