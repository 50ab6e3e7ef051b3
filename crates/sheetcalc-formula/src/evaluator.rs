//! Formula evaluator
//!
//! The [`Evaluator`] reads cells through a [`Model`], computes formula cells
//! on demand and memoizes their values until a write invalidates them.
//!
//! One evaluator serves any number of concurrent [`Evaluator::evaluate`]
//! calls. Each formula cell is computed by at most one call at a time: the
//! first call to reach it places a claim in the cache and later calls wait
//! for that claim to resolve. A wait-for graph between calls catches the case
//! where two calls would wait on each other, which is a circular reference
//! split across threads.

use crate::ast::FormulaExpr;
use crate::context::EvaluationContext;
use crate::dependency::{DependencyGraph, Precedent};
use crate::error::FormulaResult;
use crate::functions::FunctionRegistry;
use crate::parser::parse_formula_checked;
use crate::value::{Reference, Value};
use ahash::AHashMap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex, RwLock};
use sheetcalc_core::{
    reference, CellAddress, CellContent, CellValue, Error, ErrorKind, Model, RangeAddress,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Evaluator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Maximum number of nested formula cells on one call chain
    pub max_depth: usize,
    /// Memoize computed formula values
    pub cache_values: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            cache_values: true,
        }
    }
}

impl EvaluatorConfig {
    /// Set the maximum nesting depth
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Enable or disable memoization
    pub fn with_cache_values(mut self, cache_values: bool) -> Self {
        self.cache_values = cache_values;
        self
    }
}

/// What to evaluate: one cell or a range of cells
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Cell(CellAddress),
    Range(RangeAddress),
}

impl From<CellAddress> for Target {
    fn from(addr: CellAddress) -> Self {
        Target::Cell(addr)
    }
}

impl From<&CellAddress> for Target {
    fn from(addr: &CellAddress) -> Self {
        Target::Cell(addr.clone())
    }
}

impl From<RangeAddress> for Target {
    fn from(range: RangeAddress) -> Self {
        Target::Range(range)
    }
}

/// A formula cell being computed by one call
struct Claim {
    /// Call that computes the cell
    owner: u64,
    state: Mutex<ClaimState>,
    ready: Condvar,
}

enum ClaimState {
    Pending,
    Done(Value),
    /// The owner failed with a hard error; waiters compute the cell themselves
    Abandoned,
}

/// Abandons its claim if dropped before [`resolve`](Self::resolve), so a
/// call that unwinds never leaves waiters blocked
struct ClaimGuard<'e, 'm> {
    evaluator: &'e Evaluator<'m>,
    addr: &'e CellAddress,
    claim: Arc<Claim>,
    resolved: bool,
}

impl<'e, 'm> ClaimGuard<'e, 'm> {
    fn new(evaluator: &'e Evaluator<'m>, addr: &'e CellAddress, claim: Arc<Claim>) -> Self {
        Self {
            evaluator,
            addr,
            claim,
            resolved: false,
        }
    }

    fn resolve(mut self, value: Option<&Value>) {
        self.resolved = true;
        self.evaluator.release(self.addr, &self.claim, value);
    }
}

impl Drop for ClaimGuard<'_, '_> {
    fn drop(&mut self) {
        if !self.resolved {
            warn!("Evaluation of {} unwound; abandoning its claim", self.addr);
            self.evaluator.release(self.addr, &self.claim, None);
        }
    }
}

enum Slot {
    Ready(Value),
    Pending(Arc<Claim>),
}

enum ClaimOutcome {
    Cached(Value),
    Claimed(Arc<Claim>),
    Busy(Arc<Claim>),
}

enum WaitOutcome {
    Done(Value),
    Cycle,
    Abandoned,
}

/// Formula evaluator
pub struct Evaluator<'m> {
    model: &'m dyn Model,
    registry: &'m FunctionRegistry,
    config: EvaluatorConfig,
    /// Computed formula values and in-flight claims
    cache: DashMap<CellAddress, Slot>,
    /// Parsed formulas by text
    parsed: DashMap<String, Arc<FormulaExpr>>,
    graph: Mutex<DependencyGraph>,
    /// Call id → owner of the claim it waits on
    waits: Mutex<AHashMap<u64, u64>>,
    /// Shared by evaluations, exclusive for writes
    write_gate: RwLock<()>,
    next_call: AtomicU64,
}

impl<'m> Evaluator<'m> {
    /// Create an evaluator over `model` with the built-in functions
    pub fn new(model: &'m dyn Model) -> Self {
        Self {
            model,
            registry: FunctionRegistry::builtins(),
            config: EvaluatorConfig::default(),
            cache: DashMap::new(),
            parsed: DashMap::new(),
            graph: Mutex::new(DependencyGraph::new()),
            waits: Mutex::new(AHashMap::new()),
            write_gate: RwLock::new(()),
            next_call: AtomicU64::new(1),
        }
    }

    /// Use the given settings
    pub fn with_config(mut self, config: EvaluatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom function registry
    pub fn with_registry(mut self, registry: &'m FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn model(&self) -> &'m dyn Model {
        self.model
    }

    pub fn registry(&self) -> &'m FunctionRegistry {
        self.registry
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    // === Public operations ===

    /// Evaluate a cell or a range
    ///
    /// A cell yields its value, including a whole array when its formula
    /// produced one. A range yields an array of cell values, or a scalar for
    /// a single-cell range.
    pub fn evaluate(&self, target: impl Into<Target>) -> FormulaResult<Value> {
        let _gate = self.write_gate.read();

        match target.into() {
            Target::Cell(addr) => {
                let addr = self.canonical(&addr)?;
                let ctx = self.context(addr.clone());
                self.cell_value(&ctx, &addr)
            }
            Target::Range(range) => {
                let start = self.canonical(&range.start)?;
                let mut range = range;
                range.end.sheet = start.sheet.clone();
                range.start = start;
                let ctx = self.context(range.start.clone());
                ctx.dereference(&Reference::Area(range))
            }
        }
    }

    /// Evaluate formula text as if it were entered in `at`, without storing it
    pub fn evaluate_formula(&self, formula: &str, at: &CellAddress) -> FormulaResult<Value> {
        let _gate = self.write_gate.read();

        let at = self.canonical(at)?;
        let ast = self.parse(formula)?;
        let ctx = self.context(at);
        ctx.evaluate(&ast)
    }

    /// Store a value and invalidate everything that depended on the cell
    ///
    /// The model stays borrowed while the evaluator lives, so a workbook
    /// cannot be written behind its back:
    ///
    /// ```compile_fail
    /// use sheetcalc_core::Workbook;
    /// use sheetcalc_formula::Evaluator;
    ///
    /// let mut wb = Workbook::new();
    /// let evaluator = Evaluator::new(&wb);
    /// wb.set_cell_value("B2", 99).unwrap();
    /// evaluator.clear_cache();
    /// ```
    pub fn set_cell_value(
        &self,
        address: &CellAddress,
        value: impl Into<CellValue>,
    ) -> FormulaResult<()> {
        self.write(address, CellContent::value(value))
    }

    /// Store a formula and invalidate everything that depended on the cell
    ///
    /// The formula is parsed first; text that fails to parse is not stored.
    pub fn set_cell_formula(&self, address: &CellAddress, formula: &str) -> FormulaResult<()> {
        let content = CellContent::formula(formula);
        if let Some(text) = &content.formula {
            self.parse(text)?;
        }
        self.write(address, content)
    }

    /// The stored value of a cell, without evaluating its formula
    pub fn get_cell_value(&self, address: &CellAddress) -> FormulaResult<CellValue> {
        let addr = self.canonical(address)?;
        Ok(self.model.get_raw(&addr)?.value)
    }

    /// The memoized value of a formula cell, if there is one
    pub fn cached_value(&self, address: &CellAddress) -> Option<Value> {
        let addr = self.canonical(address).ok()?;
        match self.cache.get(&addr)?.value() {
            Slot::Ready(v) => Some(v.clone()),
            Slot::Pending(_) => None,
        }
    }

    /// Forget every memoized value and recorded dependency
    pub fn clear_cache(&self) {
        let _gate = self.write_gate.write();
        self.cache.clear();
        self.graph.lock().clear();
        debug!("Cleared evaluation cache");
    }

    // === Internals shared with the context ===

    pub(crate) fn record_dependency(&self, precedent: Precedent, dependent: CellAddress) {
        self.graph.lock().add_dependency(precedent, dependent);
    }

    /// Value of a cell, computing and memoizing formula cells
    pub(crate) fn cell_value(
        &self,
        ctx: &EvaluationContext,
        addr: &CellAddress,
    ) -> FormulaResult<Value> {
        if ctx.is_in_progress(addr) {
            debug!("Circular reference detected at {}", addr);
            return Ok(Value::Error(ErrorKind::Circular));
        }

        let content = self.model.get_raw(addr)?;
        let Some(formula) = content.formula else {
            return Ok(content.value.into());
        };

        let claim = loop {
            match self.try_claim(ctx, addr) {
                ClaimOutcome::Cached(v) => return Ok(v),
                ClaimOutcome::Claimed(claim) => break ClaimGuard::new(self, addr, claim),
                ClaimOutcome::Busy(claim) => match self.wait_for(ctx, addr, &claim) {
                    WaitOutcome::Done(v) => return Ok(v),
                    WaitOutcome::Cycle => return Ok(Value::Error(ErrorKind::Circular)),
                    WaitOutcome::Abandoned => continue,
                },
            }
        };

        let result = self.compute(ctx, addr, &formula);
        claim.resolve(result.as_ref().ok());
        result
    }

    fn context(&self, origin: CellAddress) -> EvaluationContext<'_> {
        let call_id = self.next_call.fetch_add(1, Ordering::Relaxed);
        EvaluationContext::new(self, call_id, origin)
    }

    /// Check bounds and use the stored spelling of the sheet name
    fn canonical(&self, addr: &CellAddress) -> FormulaResult<CellAddress> {
        reference::validate_bounds(addr)?;
        let sheet = self
            .model
            .sheet_name(&addr.sheet)
            .ok_or_else(|| Error::SheetNotFound(addr.sheet.clone()))?;
        Ok(CellAddress::new(sheet, addr.row, addr.col))
    }

    fn parse(&self, formula: &str) -> FormulaResult<Arc<FormulaExpr>> {
        if let Some(ast) = self.parsed.get(formula) {
            return Ok(Arc::clone(ast.value()));
        }

        let ast = Arc::new(parse_formula_checked(formula, self.registry).map_err(|e| {
            warn!("Failed to parse formula '{}': {}", formula, e);
            e
        })?);
        self.parsed.insert(formula.to_string(), Arc::clone(&ast));
        Ok(ast)
    }

    fn compute(
        &self,
        ctx: &EvaluationContext,
        addr: &CellAddress,
        formula: &str,
    ) -> FormulaResult<Value> {
        let ast = self.parse(formula)?;
        let _frame = ctx.enter(addr)?;
        self.graph.lock().clear_precedents(addr);
        ctx.evaluate(&ast)
    }

    fn write(&self, address: &CellAddress, content: CellContent) -> FormulaResult<()> {
        let _gate = self.write_gate.write();

        let addr = self.canonical(address)?;
        self.model.set_raw(&addr, content)?;
        self.invalidate(&addr);
        Ok(())
    }

    /// Drop the memoized values of `addr` and everything depending on it
    fn invalidate(&self, addr: &CellAddress) {
        let dirty = {
            let mut graph = self.graph.lock();
            let dirty = graph.transitive_dependents(addr);
            graph.clear_precedents(addr);
            dirty
        };

        self.cache.remove(addr);
        for cell in &dirty {
            self.cache.remove(cell);
        }
        debug!(
            "Invalidated {} dependent cells after writing {}",
            dirty.len(),
            addr
        );
    }

    // === Claims ===

    fn try_claim(&self, ctx: &EvaluationContext, addr: &CellAddress) -> ClaimOutcome {
        match self.cache.entry(addr.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Ready(v) => {
                    trace!("Cache hit for {}", addr);
                    ClaimOutcome::Cached(v.clone())
                }
                Slot::Pending(claim) => ClaimOutcome::Busy(Arc::clone(claim)),
            },
            Entry::Vacant(entry) => {
                let claim = Arc::new(Claim {
                    owner: ctx.call_id(),
                    state: Mutex::new(ClaimState::Pending),
                    ready: Condvar::new(),
                });
                entry.insert(Slot::Pending(Arc::clone(&claim)));
                ClaimOutcome::Claimed(claim)
            }
        }
    }

    /// Block until another call finishes `claim`
    ///
    /// Refuses to wait when the owner is, directly or through other waiting
    /// calls, waiting on this call.
    fn wait_for(&self, ctx: &EvaluationContext, addr: &CellAddress, claim: &Claim) -> WaitOutcome {
        let me = ctx.call_id();
        {
            let mut waits = self.waits.lock();
            let mut owner = claim.owner;
            loop {
                if owner == me {
                    debug!("Circular wait between evaluations detected at {}", addr);
                    return WaitOutcome::Cycle;
                }
                match waits.get(&owner) {
                    Some(&next) => owner = next,
                    None => break,
                }
            }
            waits.insert(me, claim.owner);
        }

        trace!("Waiting for {} computed by call {}", addr, claim.owner);
        let outcome = {
            let mut state = claim.state.lock();
            while matches!(*state, ClaimState::Pending) {
                claim.ready.wait(&mut state);
            }
            match &*state {
                ClaimState::Done(v) => WaitOutcome::Done(v.clone()),
                _ => WaitOutcome::Abandoned,
            }
        };

        self.waits.lock().remove(&me);
        outcome
    }

    /// Resolve a claim with the computed value, or abandon it on failure
    fn release(&self, addr: &CellAddress, claim: &Arc<Claim>, value: Option<&Value>) {
        match value {
            Some(v) if self.config.cache_values => {
                self.cache.insert(addr.clone(), Slot::Ready(v.clone()));
            }
            _ => {
                self.cache.remove_if(addr, |_, slot| {
                    matches!(slot, Slot::Pending(c) if Arc::ptr_eq(c, claim))
                });
            }
        }

        *claim.state.lock() = match value {
            Some(v) => ClaimState::Done(v.clone()),
            None => ClaimState::Abandoned,
        };
        claim.ready.notify_all();
    }
}

impl std::fmt::Debug for Evaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("config", &self.config)
            .field("cached", &self.cache.len())
            .field("parsed", &self.parsed.len())
            .finish()
    }
}
