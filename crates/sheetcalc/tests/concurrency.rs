//! Many threads sharing one evaluator

use sheetcalc::prelude::*;
use sheetcalc::{Argument, FunctionDef, FunctionRegistry, Implementation};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

const ROWS: u32 = 400;
const THREADS: u32 = 8;

fn addr(row: u32, col: u32) -> CellAddress {
    CellAddress::new("Sheet1", row, col)
}

/// A = row, B = A*2, C = B + OFFSET(B, -1, 0) (the previous B)
fn workbook() -> Workbook {
    let mut workbook = Workbook::new();
    for row in 1..=ROWS {
        workbook
            .set_cell_value(&format!("A{}", row), f64::from(row))
            .unwrap();
        workbook
            .set_cell_formula(&format!("B{}", row), &format!("=A{}*2", row))
            .unwrap();
        if row > 1 {
            let formula = format!("=B{}+OFFSET(B{},-1,0)", row, row);
            workbook
                .set_cell_formula(&format!("C{}", row), &formula)
                .unwrap();
        }
    }
    workbook.set_cell_formula("E1", &format!("=SUM(B1:B{})", ROWS)).unwrap();
    workbook
}

#[test]
fn test_independent_cells_from_many_threads() {
    let workbook = workbook();
    let evaluator = Evaluator::new(&workbook);

    for _ in 0..5 {
        evaluator.clear_cache();
        thread::scope(|s| {
            for t in 0..THREADS {
                let evaluator = &evaluator;
                s.spawn(move || {
                    // Each thread takes every THREADS-th row
                    for row in (2..=ROWS).filter(|r| r % THREADS == t) {
                        let b = evaluator.evaluate(addr(row, 2)).unwrap();
                        assert_eq!(b, Value::Number(f64::from(row * 2)));
                        let c = evaluator.evaluate(addr(row, 3)).unwrap();
                        assert_eq!(c, Value::Number(f64::from(row * 4 - 2)));
                    }
                });
            }
        });
    }
}

#[test]
fn test_shared_cells_agree_across_threads() {
    let workbook = workbook();
    let evaluator = Evaluator::new(&workbook);
    let expected = Value::Number(f64::from(ROWS * (ROWS + 1)));

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                assert_eq!(evaluator.evaluate(addr(1, 5)).unwrap(), expected);
                for row in (2..=ROWS).rev() {
                    assert_eq!(
                        evaluator.evaluate(addr(row, 3)).unwrap(),
                        Value::Number(f64::from(row * 4 - 2))
                    );
                }
            });
        }
    });

    assert_eq!(evaluator.cached_value(&addr(1, 5)), Some(expected));
}

#[test]
fn test_cycle_across_threads_does_not_deadlock() {
    let mut workbook = Workbook::new();
    workbook.set_cell_formula("A1", "=B1+1").unwrap();
    workbook.set_cell_formula("B1", "=A1+1").unwrap();

    for _ in 0..20 {
        let evaluator = Evaluator::new(&workbook);
        thread::scope(|s| {
            let a = s.spawn(|| evaluator.evaluate(addr(1, 1)).unwrap());
            let b = s.spawn(|| evaluator.evaluate(addr(1, 2)).unwrap());
            assert_eq!(a.join().unwrap(), Value::Error(ErrorKind::Circular));
            assert_eq!(b.join().unwrap(), Value::Error(ErrorKind::Circular));
        });
    }
}

#[test]
fn test_writes_between_concurrent_reads() {
    let workbook = workbook();
    let evaluator = Evaluator::new(&workbook);

    thread::scope(|s| {
        s.spawn(|| {
            for value in 1..=50 {
                evaluator.set_cell_value(&addr(1, 1), value).unwrap();
            }
        });
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..50 {
                    // B1 always reads some A1 value that was written
                    match evaluator.evaluate(addr(1, 2)).unwrap() {
                        Value::Number(n) => assert!((2.0..=100.0).contains(&n) && n % 2.0 == 0.0),
                        other => panic!("unexpected value {:?}", other),
                    }
                }
            });
        }
    });

    // After the writer is done, the cache reflects the last write
    assert_eq!(evaluator.evaluate(addr(1, 2)).unwrap(), Value::Number(100.0));
    assert_eq!(
        evaluator.evaluate(addr(1, 5)).unwrap(),
        Value::Number(f64::from(ROWS * (ROWS + 1)) - 2.0 + 100.0)
    );
}

#[test]
fn test_failed_cell_does_not_block_other_threads() {
    let mut workbook = Workbook::new();
    workbook.set_cell_formula("A1", "=1+").unwrap();
    workbook.set_cell_formula("B1", "=A1*2").unwrap();
    workbook.set_cell_formula("C1", "=IFERROR(B1,0)+1").unwrap();
    let evaluator = Evaluator::new(&workbook);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..20 {
                    assert!(matches!(
                        evaluator.evaluate(addr(1, 2)),
                        Err(FormulaError::Syntax { .. })
                    ));
                    assert!(evaluator.evaluate(addr(1, 3)).is_err());
                }
            });
        }
    });

    // Fixing the cell makes its dependents computable again
    evaluator.set_cell_formula(&addr(1, 1), "=1+1").unwrap();
    assert_eq!(evaluator.evaluate(addr(1, 3)).unwrap(), Value::Number(5.0));
}

static CALLS: AtomicUsize = AtomicUsize::new(0);

/// Panics on its first call, returns 3 afterwards
fn fn_fails_first(_: &[Argument]) -> Value {
    if CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
        panic!("first call fails");
    }
    Value::Number(3.0)
}

#[test]
fn test_panicking_cell_releases_waiting_threads() {
    let mut registry = FunctionRegistry::new();
    registry.register(FunctionDef {
        name: "FAILSFIRST",
        min_args: 0,
        max_args: Some(0),
        params: &[],
        implementation: Implementation::Pure(fn_fails_first),
    });

    let mut workbook = Workbook::new();
    workbook.set_cell_formula("A1", "=FAILSFIRST()").unwrap();
    workbook.set_cell_formula("B1", "=A1+OFFSET(A1,0,0)").unwrap();
    let evaluator = Evaluator::new(&workbook).with_registry(&registry);

    let first = catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(addr(1, 2))));
    assert!(first.is_err());

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                assert_eq!(evaluator.evaluate(addr(1, 2)).unwrap(), Value::Number(6.0));
            });
        }
    });
    assert_eq!(evaluator.cached_value(&addr(1, 1)), Some(Value::Number(3.0)));
}
