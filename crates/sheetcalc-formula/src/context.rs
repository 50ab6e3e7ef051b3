//! Per-call evaluation state and the AST walk
//!
//! An [`EvaluationContext`] is created for every top-level call into the
//! [`Evaluator`] and dropped when the call returns. It tracks the formula
//! cells being computed on this call chain, which is what circular reference
//! detection and the depth limit work from. It is deliberately `!Sync`.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::dependency::Precedent;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::Evaluator;
use crate::functions::{Argument, Implementation, ParamKind};
use crate::value::{self, Array, Operand, Reference, Value};
use ahash::AHashSet;
use log::warn;
use sheetcalc_core::{CellAddress, ErrorKind, Model, RangeAddress};
use std::cell::RefCell;

/// Most elements a reference read as an array may produce
pub const MAX_AREA_CELLS: u64 = 1 << 22;

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    evaluator: &'a Evaluator<'a>,
    call_id: u64,
    /// Cell the call started from
    origin: CellAddress,
    /// Formula cells being computed, innermost last
    stack: RefCell<Vec<CellAddress>>,
    in_progress: RefCell<AHashSet<CellAddress>>,
}

/// A formula cell on the call chain; leaves the chain when dropped
pub(crate) struct Frame<'c, 'a> {
    ctx: &'c EvaluationContext<'a>,
    addr: CellAddress,
}

impl Drop for Frame<'_, '_> {
    fn drop(&mut self) {
        self.ctx.leave(&self.addr);
    }
}

impl<'a> EvaluationContext<'a> {
    pub(crate) fn new(evaluator: &'a Evaluator<'a>, call_id: u64, origin: CellAddress) -> Self {
        Self {
            evaluator,
            call_id,
            origin,
            stack: RefCell::new(Vec::new()),
            in_progress: RefCell::new(AHashSet::new()),
        }
    }

    /// Identifier of the top-level call this context belongs to
    pub fn call_id(&self) -> u64 {
        self.call_id
    }

    /// The cell whose formula is being evaluated
    ///
    /// Relative R1C1 text and argument-less `ROW()`/`COLUMN()` resolve
    /// against this cell.
    pub fn current_cell(&self) -> CellAddress {
        self.stack
            .borrow()
            .last()
            .cloned()
            .unwrap_or_else(|| self.origin.clone())
    }

    /// Sheet of [`current_cell`](Self::current_cell)
    pub fn current_sheet(&self) -> String {
        self.current_cell().sheet
    }

    /// Number of formula cells being computed on this call chain
    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    pub fn model(&self) -> &dyn Model {
        self.evaluator.model()
    }

    /// Stored spelling of a sheet name, if the sheet exists
    pub fn canonical_sheet(&self, name: &str) -> Option<String> {
        self.model().sheet_name(name)
    }

    // === Call chain ===

    pub(crate) fn is_in_progress(&self, addr: &CellAddress) -> bool {
        self.in_progress.borrow().contains(addr)
    }

    /// Mark `addr` as being computed until the returned frame drops
    pub(crate) fn enter(&self, addr: &CellAddress) -> FormulaResult<Frame<'_, 'a>> {
        let max_depth = self.evaluator.config().max_depth;
        let mut stack = self.stack.borrow_mut();
        if stack.len() >= max_depth {
            warn!("Depth limit of {} reached evaluating {}", max_depth, addr);
            return Err(FormulaError::DepthLimit(max_depth));
        }
        stack.push(addr.clone());
        self.in_progress.borrow_mut().insert(addr.clone());
        Ok(Frame {
            ctx: self,
            addr: addr.clone(),
        })
    }

    fn leave(&self, addr: &CellAddress) {
        self.stack.borrow_mut().pop();
        self.in_progress.borrow_mut().remove(addr);
    }

    fn record(&self, precedent: Precedent) {
        if let Some(dependent) = self.stack.borrow().last() {
            self.evaluator.record_dependency(precedent, dependent.clone());
        }
    }

    // === Reading cells ===

    /// Value of one cell as seen from a formula
    ///
    /// Array results of the referenced cell collapse to their top-left element.
    pub fn cell_value(&self, addr: &CellAddress) -> FormulaResult<Value> {
        self.record(Precedent::Cell(addr.clone()));
        Ok(self.evaluator.cell_value(self, addr)?.into_scalar())
    }

    /// Values of the part of `range` that holds data
    ///
    /// Only cells inside the sheet's used extent are read. Everything outside
    /// it is blank, which every aggregate skips, so an area wholly outside
    /// the extent reads as one blank.
    pub fn area_values(&self, range: &RangeAddress) -> FormulaResult<Array> {
        self.record(Precedent::Area(range.clone()));

        let (rows, cols) = self.used_extent(range);
        match range.within(rows, cols) {
            Some(used) => self.read_block(&used, Some(&used)),
            None => Ok(Array::scalar(Value::Blank)),
        }
    }

    /// Read a reference as a value
    ///
    /// A single cell gives a scalar, a larger area an array with one element
    /// per cell. Whole-column and whole-row areas stop at the used extent;
    /// an array over [`MAX_AREA_CELLS`] gives `#NUM!`. A multi-area union
    /// has no value and gives `#VALUE!`.
    pub fn dereference(&self, reference: &Reference) -> FormulaResult<Value> {
        let range = match reference.single_area() {
            Some(range) if range.is_single_cell() => return self.cell_value(&range.start),
            Some(range) => range,
            None => return Ok(Value::Error(ErrorKind::Value)),
        };
        self.record(Precedent::Area(range.clone()));

        let (rows, cols) = self.used_extent(range);
        let shape = range.clip_to(rows, cols);
        let size = u64::from(shape.rows()) * u64::from(shape.cols());
        if size > MAX_AREA_CELLS {
            warn!("{} has {} cells, more than an array may hold", range, size);
            return Ok(Value::Error(ErrorKind::Num));
        }
        let used = shape.within(rows, cols);
        Ok(Value::Array(self.read_block(&shape, used.as_ref())?))
    }

    fn used_extent(&self, range: &RangeAddress) -> (u32, u32) {
        self.model().used_extent(range.sheet()).unwrap_or((0, 0))
    }

    /// Values of `block`, read from the model inside `used` and blank elsewhere
    fn read_block(
        &self,
        block: &RangeAddress,
        used: Option<&RangeAddress>,
    ) -> FormulaResult<Array> {
        let mut rows = Vec::with_capacity(block.rows() as usize);
        for row in block.start.row..=block.end.row {
            let mut values = Vec::with_capacity(block.cols() as usize);
            for col in block.start.col..=block.end.col {
                let addr = CellAddress::new(block.sheet(), row, col);
                values.push(match used {
                    Some(used) if used.contains(&addr) => self.evaluator.cell_value(self, &addr)?,
                    _ => Value::Blank,
                });
            }
            rows.push(values);
        }
        Ok(Array::from_rows(rows).unwrap_or_else(|| Array::scalar(Value::Blank)))
    }

    fn operand_value(&self, operand: Operand) -> FormulaResult<Value> {
        match operand {
            Operand::Reference(r) => self.dereference(&r),
            Operand::Value(v) => Ok(v),
        }
    }

    // === Expressions ===

    /// Evaluate an expression where a value is expected
    pub fn evaluate(&self, expr: &FormulaExpr) -> FormulaResult<Value> {
        match expr {
            FormulaExpr::Number(n) => Ok(Value::Number(*n)),
            FormulaExpr::Text(s) => Ok(Value::Text(s.clone())),
            FormulaExpr::Boolean(b) => Ok(Value::Boolean(*b)),
            FormulaExpr::Error(e) => Ok(Value::Error(*e)),

            FormulaExpr::CellRef(_)
            | FormulaExpr::RangeRef(_)
            | FormulaExpr::NameRef(_)
            | FormulaExpr::AreaUnion(_)
            | FormulaExpr::BinaryOp {
                op: BinaryOperator::Range,
                ..
            }
            | FormulaExpr::Function { .. } => {
                let operand = self.evaluate_operand(expr)?;
                self.operand_value(operand)
            }

            FormulaExpr::BinaryOp { op, left, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(value::binary_op(*op, &left, &right))
            }

            FormulaExpr::UnaryOp { op, operand } => {
                let v = self.evaluate(operand)?;
                Ok(match op {
                    UnaryOperator::Negate => value::negate(&v),
                    UnaryOperator::Percent => value::percent(&v),
                })
            }

            FormulaExpr::Array(rows) => {
                let mut values = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut row_values = Vec::with_capacity(row.len());
                    for item in row {
                        row_values.push(self.evaluate(item)?.into_scalar());
                    }
                    values.push(row_values);
                }
                Ok(Array::from_rows(values)
                    .map(Value::Array)
                    .unwrap_or(Value::Error(ErrorKind::Value)))
            }
        }
    }

    /// Evaluate an expression where a reference is acceptable
    ///
    /// Reference-producing expressions (cell and range references, names,
    /// unions, the range operator and functions such as `OFFSET`) come back as
    /// [`Operand::Reference`]; everything else as a value.
    pub fn evaluate_operand(&self, expr: &FormulaExpr) -> FormulaResult<Operand> {
        match expr {
            FormulaExpr::CellRef(cell) => {
                let Some(sheet) = self.resolve_sheet(cell.sheet.as_deref()) else {
                    return Ok(ErrorKind::Ref.into());
                };
                Ok(RangeAddress::single(cell.resolve(&sheet)).into())
            }

            FormulaExpr::RangeRef(range) => {
                let Some(sheet) = self.resolve_sheet(range.sheet.as_deref()) else {
                    return Ok(ErrorKind::Ref.into());
                };
                Ok(range.resolve(&sheet).into())
            }

            FormulaExpr::NameRef(name) => Ok(self.resolve_name(name)),

            FormulaExpr::AreaUnion(items) => {
                let mut areas = Vec::with_capacity(items.len());
                for item in items {
                    match self.evaluate_operand(item)? {
                        Operand::Reference(r) => areas.extend_from_slice(r.areas()),
                        Operand::Value(Value::Error(e)) => return Ok(e.into()),
                        Operand::Value(_) => return Ok(ErrorKind::Value.into()),
                    }
                }
                Ok(Operand::Reference(Reference::Union(areas)))
            }

            FormulaExpr::BinaryOp {
                op: BinaryOperator::Range,
                left,
                right,
            } => {
                let left = self.evaluate_operand(left)?;
                let right = self.evaluate_operand(right)?;
                Ok(range_between(left, right))
            }

            FormulaExpr::Function { name, args } => self.call_function(name, args),

            _ => Ok(Operand::Value(self.evaluate(expr)?)),
        }
    }

    fn resolve_sheet(&self, sheet: Option<&str>) -> Option<String> {
        match sheet {
            Some(name) => self.canonical_sheet(name),
            None => Some(self.current_sheet()),
        }
    }

    fn resolve_name(&self, name: &str) -> Operand {
        let Some(mut target) = self.model().defined_name_target(name) else {
            return ErrorKind::Name.into();
        };
        let Some(sheet) = self.canonical_sheet(target.sheet()) else {
            return ErrorKind::Ref.into();
        };
        target.start.sheet = sheet.clone();
        target.end.sheet = sheet;
        target.into()
    }

    // === Functions ===

    fn call_function(&self, name: &str, args: &[FormulaExpr]) -> FormulaResult<Operand> {
        let Some(def) = self.evaluator.registry().get(name) else {
            return Ok(ErrorKind::Name.into());
        };
        def.check_arity(args.len())?;

        let mut prepared = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            match self.prepare_argument(def.param_kind(index), arg)? {
                Ok(argument) => prepared.push(argument),
                Err(e) => return Ok(e.into()),
            }
        }

        match def.implementation {
            Implementation::Pure(f) => Ok(Operand::Value(f(&prepared))),
            Implementation::Contextual(f) => Ok(Operand::Value(f(&prepared, self)?)),
            Implementation::Reference(f) => f(&prepared, self),
        }
    }

    /// Prepare one argument for its declared kind
    ///
    /// The inner `Err` carries the error value a typed parameter short-circuits
    /// the call with.
    fn prepare_argument<'e>(
        &self,
        kind: ParamKind,
        expr: &'e FormulaExpr,
    ) -> FormulaResult<Result<Argument<'e>, ErrorKind>> {
        let argument = match kind {
            ParamKind::Any => Argument::Value(self.evaluate(expr)?),
            ParamKind::Number => {
                let v = self.evaluate(expr)?.into_scalar();
                match v.to_number() {
                    Ok(n) => Argument::Value(Value::Number(n)),
                    Err(e) => return Ok(Err(e)),
                }
            }
            ParamKind::Text => {
                let v = self.evaluate(expr)?.into_scalar();
                match v.to_text() {
                    Ok(s) => Argument::Value(Value::Text(s)),
                    Err(e) => return Ok(Err(e)),
                }
            }
            ParamKind::Boolean => {
                let v = self.evaluate(expr)?.into_scalar();
                match v.to_bool() {
                    Ok(b) => Argument::Value(Value::Boolean(b)),
                    Err(e) => return Ok(Err(e)),
                }
            }
            ParamKind::Areas => match self.evaluate_operand(expr)? {
                Operand::Reference(r) => {
                    let mut areas = Vec::with_capacity(r.areas().len());
                    for area in r.areas() {
                        areas.push(self.area_values(area)?);
                    }
                    Argument::Areas(areas)
                }
                Operand::Value(Value::Array(a)) => Argument::Areas(vec![a]),
                Operand::Value(v) => Argument::Value(v),
            },
            ParamKind::Reference => match self.evaluate_operand(expr)? {
                Operand::Reference(r) => Argument::Reference(r),
                Operand::Value(v) => Argument::Value(v),
            },
            ParamKind::Lazy => Argument::Lazy(expr),
        };
        Ok(Ok(argument))
    }
}

/// The range operator: smallest area covering both sides
fn range_between(left: Operand, right: Operand) -> Operand {
    let area = |operand: Operand| match operand {
        Operand::Reference(r) => r.single_area().cloned().ok_or(ErrorKind::Value),
        Operand::Value(Value::Error(e)) => Err(e),
        Operand::Value(_) => Err(ErrorKind::Value),
    };
    let (left, right) = match (area(left), area(right)) {
        (Ok(l), Ok(r)) => (l, r),
        (Err(e), _) | (_, Err(e)) => return e.into(),
    };
    match left.bounding(&right) {
        Ok(range) => range.into(),
        Err(_) => ErrorKind::Value.into(),
    }
}
