//! Formula parser
//!
//! A recursive descent parser over the token stream with Excel operator
//! precedence. From lowest to highest:
//!
//! 1. Comparison: `=`, `<>`, `<`, `<=`, `>`, `>=`
//! 2. Concatenation: `&`
//! 3. Addition/Subtraction: `+`, `-`
//! 4. Multiplication/Division: `*`, `/`
//! 5. Exponentiation: `^` (left associative, `2^3^2` is `(2^3)^2`)
//! 6. Percent: postfix `%`
//! 7. Negation: prefix `-`
//! 8. Range: `:`
//! 9. Primary: literals, references, names, calls, parentheses, arrays

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;
use crate::tokenizer::{tokenize, Token, TokenKind, TokenSubtype};
use sheetcalc_core::{reference, CellCoord, ErrorKind, RangeKind};

/// Parse formula text into an AST
///
/// The leading `=` is optional. Only syntax is checked: unknown function
/// names are accepted and evaluate to `#NAME?`.
///
/// # Example
/// ```rust
/// use sheetcalc_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// assert!(parse_formula("=(1+2").is_err());
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let formula = formula.trim();
    let body = formula.strip_prefix('=').unwrap_or(formula);

    let tokens: Vec<Token> = tokenize(body)?
        .into_iter()
        .filter(|t| t.kind != TokenKind::Whitespace)
        .collect();
    if tokens.is_empty() {
        return Err(FormulaError::syntax(0, "empty formula"));
    }

    let mut parser = FormulaParser {
        tokens,
        pos: 0,
        end: body.len(),
    };
    let expr = parser.parse_expression()?;

    if let Some(token) = parser.current() {
        return Err(FormulaError::syntax(
            token.position,
            format!("unexpected '{}' after expression", token.text),
        ));
    }

    Ok(expr)
}

/// Parse formula text and check the argument count of every known function
pub fn parse_formula_checked(
    formula: &str,
    registry: &FunctionRegistry,
) -> FormulaResult<FormulaExpr> {
    let expr = parse_formula(formula)?;

    let mut failure = None;
    expr.walk(&mut |node| {
        let FormulaExpr::Function { name, args } = node else {
            return;
        };
        if failure.is_some() {
            return;
        }
        if let Some(def) = registry.get(name) {
            if let Err(e) = def.check_arity(args.len()) {
                failure = Some(e);
            }
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(expr),
    }
}

/// Formula parser
struct FormulaParser {
    tokens: Vec<Token>,
    pos: usize,
    /// Length of the input, reported for errors at end of input
    end: usize,
}

impl FormulaParser {
    // === Token access ===

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn current_is(&self, kind: TokenKind) -> bool {
        self.current().map_or(false, |t| t.kind == kind)
    }

    fn current_is_operator(&self, text: &str) -> bool {
        self.current().map_or(false, |t| t.is_operator(text))
    }

    fn current_is_separator(&self, text: &str) -> bool {
        self.current()
            .map_or(false, |t| t.kind == TokenKind::Separator && t.text == text)
    }

    fn position(&self) -> usize {
        self.current().map_or(self.end, |t| t.position)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> FormulaResult<()> {
        if self.current_is(kind) {
            self.pos += 1;
            return Ok(());
        }
        let found = match self.current() {
            Some(t) => format!("'{}'", t.text),
            None => "end of formula".to_string(),
        };
        Err(FormulaError::syntax(
            self.position(),
            format!("expected {}, found {}", what, found),
        ))
    }

    // === Expression parsing with precedence ===

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current() {
                Some(t) if t.kind == TokenKind::Operator => match t.text.as_str() {
                    "=" => BinaryOperator::Equal,
                    "<>" => BinaryOperator::NotEqual,
                    "<" => BinaryOperator::LessThan,
                    "<=" => BinaryOperator::LessEqual,
                    ">" => BinaryOperator::GreaterThan,
                    ">=" => BinaryOperator::GreaterEqual,
                    _ => break,
                },
                _ => break,
            };

            self.pos += 1;
            let right = self.parse_concatenation()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while self.current_is_operator("&") {
            self.pos += 1;
            let right = self.parse_additive()?;
            left = binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = if self.current_is_operator("+") {
                BinaryOperator::Add
            } else if self.current_is_operator("-") {
                BinaryOperator::Subtract
            } else {
                break;
            };

            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_power()?;

        loop {
            let op = if self.current_is_operator("*") {
                BinaryOperator::Multiply
            } else if self.current_is_operator("/") {
                BinaryOperator::Divide
            } else {
                break;
            };

            self.pos += 1;
            let right = self.parse_power()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_power(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_percent()?;

        // Left associative, unlike most languages
        while self.current_is_operator("^") {
            self.pos += 1;
            let right = self.parse_percent()?;
            left = binary(BinaryOperator::Power, left, right);
        }

        Ok(left)
    }

    fn parse_percent(&mut self) -> FormulaResult<FormulaExpr> {
        let mut expr = self.parse_unary()?;

        while self.current_is_operator("%") {
            self.pos += 1;
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        if self.current_is_operator("-") {
            self.pos += 1;
            let operand = self.parse_unary()?;
            return Ok(FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            });
        }

        // Prefix plus (no-op)
        if self.current_is_operator("+") {
            self.pos += 1;
            return self.parse_unary();
        }

        self.parse_range()
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_primary()?;

        while self.current_is_operator(":") {
            self.pos += 1;
            let right = self.parse_primary()?;
            left = binary(BinaryOperator::Range, left, right);
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        let position = self.position();
        let Some(token) = self.consume() else {
            return Err(FormulaError::syntax(position, "unexpected end of formula"));
        };

        match (token.kind, token.subtype) {
            (TokenKind::Operand, TokenSubtype::Number) => token
                .text
                .parse::<f64>()
                .map(FormulaExpr::Number)
                .map_err(|_| FormulaError::syntax(position, "invalid number")),

            (TokenKind::Operand, TokenSubtype::Text) => {
                let inner = &token.text[1..token.text.len() - 1];
                Ok(FormulaExpr::Text(inner.replace("\"\"", "\"")))
            }

            (TokenKind::Operand, TokenSubtype::Boolean) => Ok(FormulaExpr::Boolean(
                token.text.eq_ignore_ascii_case("TRUE"),
            )),

            (TokenKind::Operand, TokenSubtype::Error) => ErrorKind::parse(&token.text)
                .map(FormulaExpr::Error)
                .ok_or_else(|| FormulaError::syntax(position, "unknown error literal")),

            (TokenKind::Operand, TokenSubtype::Reference | TokenSubtype::SheetReference) => {
                parse_reference(&token)
            }

            (TokenKind::Operand, _) => Ok(FormulaExpr::NameRef(token.text)),

            (TokenKind::Function, _) => self.parse_function_call(token.text),

            (TokenKind::OpenParen, _) => self.parse_parenthesized(),

            (TokenKind::ArrayOpen, _) => self.parse_array(position),

            _ => Err(FormulaError::syntax(
                position,
                format!("unexpected '{}'", token.text),
            )),
        }
    }

    /// `(expr)` or an area union `(ref, ref, ...)`
    fn parse_parenthesized(&mut self) -> FormulaResult<FormulaExpr> {
        let first = self.parse_expression()?;
        if !self.current_is_separator(",") {
            self.expect(TokenKind::CloseParen, "')'")?;
            return Ok(first);
        }

        let mut areas = vec![first];
        while self.current_is_separator(",") {
            self.pos += 1;
            areas.push(self.parse_expression()?);
        }
        self.expect(TokenKind::CloseParen, "')'")?;
        Ok(FormulaExpr::AreaUnion(areas))
    }

    fn parse_array(&mut self, open_position: usize) -> FormulaResult<FormulaExpr> {
        let mut rows = Vec::new();
        let mut current_row = vec![self.parse_array_item()?];

        loop {
            if self.current_is_separator(",") {
                self.pos += 1;
                current_row.push(self.parse_array_item()?);
            } else if self.current_is_separator(";") {
                self.pos += 1;
                rows.push(std::mem::take(&mut current_row));
                current_row.push(self.parse_array_item()?);
            } else {
                break;
            }
        }
        rows.push(current_row);
        self.expect(TokenKind::ArrayClose, "',', ';' or '}' in array")?;

        let width = rows[0].len();
        if rows.iter().any(|row| row.len() != width) {
            return Err(FormulaError::syntax(
                open_position,
                "array rows must all have the same length",
            ));
        }

        Ok(FormulaExpr::Array(rows))
    }

    /// A constant inside `{...}`: a number with an optional sign, text, a
    /// boolean or an error literal
    fn parse_array_item(&mut self) -> FormulaResult<FormulaExpr> {
        let position = self.position();
        let negate = self.current_is_operator("-");
        let signed = negate || self.current_is_operator("+");
        if signed {
            self.pos += 1;
        }

        let constant = match self.current() {
            Some(t) if t.kind == TokenKind::Operand => match t.subtype {
                TokenSubtype::Number => true,
                TokenSubtype::Text | TokenSubtype::Boolean | TokenSubtype::Error => !signed,
                _ => false,
            },
            _ => false,
        };
        if !constant {
            return Err(FormulaError::syntax(
                position,
                "array constants may only hold numbers, text, booleans and errors",
            ));
        }

        Ok(match self.parse_primary()? {
            FormulaExpr::Number(n) if negate => FormulaExpr::Number(-n),
            item => item,
        })
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(TokenKind::OpenParen, "'('")?;

        let mut args = Vec::new();
        if !self.current_is(TokenKind::CloseParen) {
            args.push(self.parse_argument()?);

            while self.current_is_separator(",") {
                self.pos += 1;
                args.push(self.parse_argument()?);
            }
        }

        self.expect(TokenKind::CloseParen, "',' or ')'")?;

        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }

    fn parse_argument(&mut self) -> FormulaResult<FormulaExpr> {
        if self.current_is_separator(",") || self.current_is(TokenKind::CloseParen) {
            return Err(FormulaError::syntax(self.position(), "missing argument"));
        }
        self.parse_expression()
    }
}

fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn parse_reference(token: &Token) -> FormulaResult<FormulaExpr> {
    let invalid = |e: sheetcalc_core::Error| FormulaError::syntax(token.position, e.to_string());

    let (sheet, body) = reference::split_range_sheet(&token.text).map_err(invalid)?;
    if !body.contains(':') {
        let coord = CellCoord::parse_a1(&body).map_err(invalid)?;
        return Ok(FormulaExpr::CellRef(CellReference { sheet, coord }));
    }

    let (start, end, kind) = reference::parse_range_body(&body).map_err(invalid)?;
    Ok(FormulaExpr::RangeRef(RangeReference {
        sheet,
        start,
        end,
        kind,
    }))
}
