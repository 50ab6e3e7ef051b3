//! Built-in functions
//!
//! Every function is described by a [`FunctionDef`]: its name, arity, the
//! kind of each parameter and how it is implemented. The evaluator prepares
//! arguments from the declared [`ParamKind`]s before calling the
//! implementation, so coercion and error propagation for typed parameters
//! happen in one place.

pub mod info;
pub mod logical;
pub mod math;
pub mod reference;

use crate::ast::FormulaExpr;
use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::value::{self, Array, Operand, Value};
use ahash::AHashMap;

/// How an argument is prepared before the implementation sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any value; references are read, errors are passed through
    Any,
    /// Coerced to a number; an error or non-numeric text short-circuits the call
    Number,
    /// Coerced to text; an error short-circuits the call
    Text,
    /// Coerced to a boolean; an error or non-boolean text short-circuits the call
    Boolean,
    /// References, unions and arrays become [`Argument::Areas`]; scalars stay values
    Areas,
    /// Kept as [`Argument::Reference`] when the expression yields a reference
    Reference,
    /// Left unevaluated as [`Argument::Lazy`]
    Lazy,
}

/// A prepared argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument<'a> {
    Value(Value),
    Areas(Vec<Array>),
    Reference(value::Reference),
    Lazy(&'a FormulaExpr),
}

impl Argument<'_> {
    /// The value of a typed or `Any` argument
    pub fn value(&self) -> Option<&Value> {
        match self {
            Argument::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The number of a [`ParamKind::Number`] argument
    pub fn number(&self) -> Option<f64> {
        match self {
            Argument::Value(Value::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// The boolean of a [`ParamKind::Boolean`] argument
    pub fn boolean(&self) -> Option<bool> {
        match self {
            Argument::Value(Value::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// The text of a [`ParamKind::Text`] argument
    pub fn text(&self) -> Option<&str> {
        match self {
            Argument::Value(Value::Text(s)) => Some(s),
            _ => None,
        }
    }
}

/// Function operating on prepared arguments only
pub type PureFn = fn(&[Argument]) -> Value;

/// Function that needs the evaluation context (calling cell, nested evaluation)
pub type ContextualFn = fn(&[Argument], &EvaluationContext) -> FormulaResult<Value>;

/// Function that may produce a reference instead of a value
pub type ReferenceFn = fn(&[Argument], &EvaluationContext) -> FormulaResult<Operand>;

/// Function implementation
#[derive(Clone, Copy)]
pub enum Implementation {
    Pure(PureFn),
    Contextual(ContextualFn),
    Reference(ReferenceFn),
}

impl Implementation {
    /// Whether the implementation receives the evaluation context
    pub fn needs_context(&self) -> bool {
        !matches!(self, Implementation::Pure(_))
    }
}

/// Function definition
#[derive(Clone, Copy)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Parameter kinds; the last one repeats for further arguments
    pub params: &'static [ParamKind],
    /// Implementation
    pub implementation: Implementation,
}

impl FunctionDef {
    /// Kind of the parameter at `index`
    pub fn param_kind(&self, index: usize) -> ParamKind {
        self.params
            .get(index)
            .or_else(|| self.params.last())
            .copied()
            .unwrap_or(ParamKind::Any)
    }

    /// Check an argument count against the declared arity
    pub fn check_arity(&self, count: usize) -> FormulaResult<()> {
        let within = count >= self.min_args && self.max_args.map_or(true, |max| count <= max);
        if within {
            return Ok(());
        }

        let expected = match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        };
        Err(FormulaError::ArgumentCount {
            function: self.name.to_string(),
            expected,
            actual: count,
        })
    }
}

impl std::fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("params", &self.params)
            .finish()
    }
}

static BUILTINS: once_cell::sync::Lazy<FunctionRegistry> =
    once_cell::sync::Lazy::new(FunctionRegistry::new);

/// Function registry
///
/// Lookups are case-insensitive. A registry is immutable once shared, so one
/// instance serves any number of concurrent evaluations.
#[derive(Debug)]
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_reference_functions();
        registry.register_logical_functions();
        registry.register_info_functions();
        registry.register_math_functions();

        registry
    }

    /// Create a registry with no functions
    pub fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// The shared registry of built-in functions
    pub fn builtins() -> &'static FunctionRegistry {
        &BUILTINS
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function, replacing any previous definition of the name
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_reference_functions(&mut self) {
        use ParamKind::*;

        self.register(FunctionDef {
            name: "OFFSET",
            min_args: 3,
            max_args: Some(5),
            params: &[Reference, Number],
            implementation: Implementation::Reference(reference::fn_offset),
        });

        self.register(FunctionDef {
            name: "INDEX",
            min_args: 2,
            max_args: Some(4),
            params: &[Reference, Number],
            implementation: Implementation::Reference(reference::fn_index),
        });

        self.register(FunctionDef {
            name: "INDIRECT",
            min_args: 1,
            max_args: Some(2),
            params: &[Text, Boolean],
            implementation: Implementation::Reference(reference::fn_indirect),
        });

        self.register(FunctionDef {
            name: "ROW",
            min_args: 0,
            max_args: Some(1),
            params: &[Reference],
            implementation: Implementation::Contextual(reference::fn_row),
        });

        self.register(FunctionDef {
            name: "COLUMN",
            min_args: 0,
            max_args: Some(1),
            params: &[Reference],
            implementation: Implementation::Contextual(reference::fn_column),
        });

        self.register(FunctionDef {
            name: "ROWS",
            min_args: 1,
            max_args: Some(1),
            params: &[Reference],
            implementation: Implementation::Pure(reference::fn_rows),
        });

        self.register(FunctionDef {
            name: "COLUMNS",
            min_args: 1,
            max_args: Some(1),
            params: &[Reference],
            implementation: Implementation::Pure(reference::fn_columns),
        });

        self.register(FunctionDef {
            name: "AREAS",
            min_args: 1,
            max_args: Some(1),
            params: &[Reference],
            implementation: Implementation::Pure(reference::fn_areas),
        });

        self.register(FunctionDef {
            name: "ADDRESS",
            min_args: 2,
            max_args: Some(5),
            params: &[Number, Number, Number, Boolean, Text],
            implementation: Implementation::Pure(reference::fn_address),
        });
    }

    fn register_logical_functions(&mut self) {
        use ParamKind::*;

        self.register(FunctionDef {
            name: "IF",
            min_args: 2,
            max_args: Some(3),
            params: &[Boolean, Lazy],
            implementation: Implementation::Contextual(logical::fn_if),
        });

        self.register(FunctionDef {
            name: "AND",
            min_args: 1,
            max_args: None,
            params: &[Areas],
            implementation: Implementation::Pure(logical::fn_and),
        });

        self.register(FunctionDef {
            name: "OR",
            min_args: 1,
            max_args: None,
            params: &[Areas],
            implementation: Implementation::Pure(logical::fn_or),
        });

        self.register(FunctionDef {
            name: "NOT",
            min_args: 1,
            max_args: Some(1),
            params: &[Boolean],
            implementation: Implementation::Pure(logical::fn_not),
        });

        self.register(FunctionDef {
            name: "IFERROR",
            min_args: 2,
            max_args: Some(2),
            params: &[Any, Lazy],
            implementation: Implementation::Contextual(logical::fn_iferror),
        });

        self.register(FunctionDef {
            name: "IFNA",
            min_args: 2,
            max_args: Some(2),
            params: &[Any, Lazy],
            implementation: Implementation::Contextual(logical::fn_ifna),
        });
    }

    fn register_info_functions(&mut self) {
        use ParamKind::*;

        let predicates: [(&'static str, PureFn); 7] = [
            ("ISBLANK", info::fn_isblank),
            ("ISERROR", info::fn_iserror),
            ("ISERR", info::fn_iserr),
            ("ISNA", info::fn_isna),
            ("ISNUMBER", info::fn_isnumber),
            ("ISTEXT", info::fn_istext),
            ("ISLOGICAL", info::fn_islogical),
        ];
        for (name, implementation) in predicates {
            self.register(FunctionDef {
                name,
                min_args: 1,
                max_args: Some(1),
                params: &[Any],
                implementation: Implementation::Pure(implementation),
            });
        }

        self.register(FunctionDef {
            name: "ISREF",
            min_args: 1,
            max_args: Some(1),
            params: &[Reference],
            implementation: Implementation::Pure(info::fn_isref),
        });

        self.register(FunctionDef {
            name: "NA",
            min_args: 0,
            max_args: Some(0),
            params: &[],
            implementation: Implementation::Pure(info::fn_na),
        });
    }

    fn register_math_functions(&mut self) {
        use ParamKind::*;

        let aggregates: [(&'static str, PureFn); 6] = [
            ("SUM", math::fn_sum),
            ("COUNT", math::fn_count),
            ("COUNTA", math::fn_counta),
            ("AVERAGE", math::fn_average),
            ("MIN", math::fn_min),
            ("MAX", math::fn_max),
        ];
        for (name, implementation) in aggregates {
            self.register(FunctionDef {
                name,
                min_args: 1,
                max_args: None,
                params: &[Areas],
                implementation: Implementation::Pure(implementation),
            });
        }
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = FunctionRegistry::new();
        assert_eq!(registry.get("offset").map(|d| d.name), Some("OFFSET"));
        assert_eq!(registry.get("IfError").map(|d| d.name), Some("IFERROR"));
        assert!(registry.get("NOSUCHFN").is_none());
    }

    #[test]
    fn test_catalog_is_complete() {
        let registry = FunctionRegistry::builtins();
        for name in [
            "OFFSET", "INDEX", "INDIRECT", "ROW", "COLUMN", "ROWS", "COLUMNS", "AREAS",
            "ADDRESS", "IF", "AND", "OR", "NOT", "IFERROR", "IFNA", "ISBLANK", "ISERROR",
            "ISERR", "ISNA", "ISNUMBER", "ISTEXT", "ISLOGICAL", "ISREF", "NA", "SUM", "COUNT",
            "COUNTA", "AVERAGE", "MIN", "MAX",
        ] {
            assert!(registry.get(name).is_some(), "{} is not registered", name);
        }
        assert_eq!(registry.len(), 30);
    }

    #[test]
    fn test_param_kind_repeats_last() {
        let registry = FunctionRegistry::new();
        let offset = registry.get("OFFSET").unwrap();
        assert_eq!(offset.param_kind(0), ParamKind::Reference);
        assert_eq!(offset.param_kind(4), ParamKind::Number);
        let na = registry.get("NA").unwrap();
        assert_eq!(na.param_kind(0), ParamKind::Any);
    }

    #[test]
    fn test_context_flag() {
        let registry = FunctionRegistry::new();
        assert!(registry.get("INDIRECT").unwrap().implementation.needs_context());
        assert!(registry.get("ROW").unwrap().implementation.needs_context());
        assert!(!registry.get("SUM").unwrap().implementation.needs_context());
    }

    #[test]
    fn test_check_arity_messages() {
        let registry = FunctionRegistry::new();
        let expected = |name: &str, count: usize| match registry.get(name).unwrap().check_arity(count) {
            Err(FormulaError::ArgumentCount { expected, .. }) => expected,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(expected("NOT", 2), "1");
        assert_eq!(expected("OFFSET", 2), "3 to 5");
        assert_eq!(expected("SUM", 0), "at least 1");
        assert!(registry.get("SUM").unwrap().check_arity(40).is_ok());
    }

    #[test]
    fn test_register_custom_function() {
        fn fn_answer(_: &[Argument]) -> Value {
            Value::Number(42.0)
        }

        let mut registry = FunctionRegistry::empty();
        assert!(registry.is_empty());
        registry.register(FunctionDef {
            name: "ANSWER",
            min_args: 0,
            max_args: Some(0),
            params: &[],
            implementation: Implementation::Pure(fn_answer),
        });
        assert!(registry.get("answer").is_some());
    }
}
