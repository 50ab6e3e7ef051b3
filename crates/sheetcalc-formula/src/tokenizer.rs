//! Formula tokenizer
//!
//! Turns formula text (without the leading `=`) into a flat token stream.
//! Every character of the input belongs to exactly one token, so joining the
//! token texts gives back the input. References, including ranges such as
//! `A1:B2`, `A:A`, `1:1` and `'My Sheet'!A1`, are single operand tokens.

use crate::error::{FormulaError, FormulaResult};
use sheetcalc_core::{cell::letters_to_column, MAX_ROWS};

/// Broad token category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal, reference or name
    Operand,
    /// Arithmetic, comparison, concatenation, percent or range operator
    Operator,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `,` between arguments or array items, `;` between array rows
    Separator,
    /// Function name immediately followed by `(`
    Function,
    /// `{`
    ArrayOpen,
    /// `}`
    ArrayClose,
    /// A run of whitespace
    Whitespace,
}

/// Operand detail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSubtype {
    None,
    Number,
    Text,
    Boolean,
    Error,
    /// Cell or range reference on the current sheet
    Reference,
    /// Cell or range reference with a sheet prefix
    SheetReference,
    /// Defined name
    Name,
}

/// A lexical unit with its raw text and byte position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub subtype: TokenSubtype,
    pub text: String,
    pub position: usize,
}

impl Token {
    fn new(kind: TokenKind, subtype: TokenSubtype, text: &str, position: usize) -> Self {
        Self {
            kind,
            subtype,
            text: text.to_string(),
            position,
        }
    }

    /// Whether this is an operator token with the given text
    pub fn is_operator(&self, text: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == text
    }
}

/// Tokenize formula text
///
/// # Example
/// ```rust
/// use sheetcalc_formula::tokenizer::{tokenize, TokenKind, TokenSubtype};
///
/// let tokens = tokenize("SUM(Data!A1:B2)").unwrap();
/// assert_eq!(tokens[0].kind, TokenKind::Function);
/// assert_eq!(tokens[2].subtype, TokenSubtype::SheetReference);
/// assert_eq!(tokens[2].text, "Data!A1:B2");
/// ```
pub fn tokenize(formula: &str) -> FormulaResult<Vec<Token>> {
    Tokenizer {
        input: formula,
        pos: 0,
    }
    .run()
}

const ERROR_LITERALS: [&str; 7] = [
    "#NULL!", "#DIV/0!", "#VALUE!", "#REF!", "#NAME?", "#NUM!", "#N/A",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefPart {
    Cell,
    Column,
    Row,
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn run(mut self) -> FormulaResult<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek_char() {
            let start = self.pos;
            let token = match c {
                c if c.is_whitespace() => {
                    self.advance_while(|c| c.is_whitespace());
                    self.token(TokenKind::Whitespace, TokenSubtype::None, start)
                }
                '"' => self.scan_text()?,
                '#' => self.scan_error()?,
                '\'' => self.scan_quoted_reference()?,
                '(' => self.single(TokenKind::OpenParen),
                ')' => self.single(TokenKind::CloseParen),
                '{' => self.single(TokenKind::ArrayOpen),
                '}' => self.single(TokenKind::ArrayClose),
                ',' | ';' => self.single(TokenKind::Separator),
                '+' | '-' | '*' | '/' | '^' | '&' | '%' | '=' | ':' => {
                    self.single(TokenKind::Operator)
                }
                '<' => {
                    self.advance();
                    if matches!(self.peek_char(), Some('=') | Some('>')) {
                        self.advance();
                    }
                    self.token(TokenKind::Operator, TokenSubtype::None, start)
                }
                '>' => {
                    self.advance();
                    if self.peek_char() == Some('=') {
                        self.advance();
                    }
                    self.token(TokenKind::Operator, TokenSubtype::None, start)
                }
                c if c.is_ascii_digit() || c == '.' => match self.match_reference() {
                    Some((end, subtype)) => self.operand_to(end, subtype),
                    None => self.scan_number()?,
                },
                c if is_name_start(c) || c == '$' => match self.match_reference() {
                    Some((end, subtype)) => self.operand_to(end, subtype),
                    None => self.scan_identifier()?,
                },
                other => {
                    return Err(FormulaError::syntax(
                        start,
                        format!("unexpected character '{}'", other),
                    ))
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    // === Scanners ===

    fn scan_text(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance();
        loop {
            match self.peek_char() {
                None => return Err(FormulaError::syntax(start, "unterminated text literal")),
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Ok(self.token(TokenKind::Operand, TokenSubtype::Text, start));
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn scan_error(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        let rest = &self.input[start..];
        let literal = ERROR_LITERALS.iter().find(|lit| {
            rest.get(..lit.len())
                .map_or(false, |head| head.eq_ignore_ascii_case(lit))
        });
        match literal {
            Some(lit) => {
                self.pos += lit.len();
                Ok(self.token(TokenKind::Operand, TokenSubtype::Error, start))
            }
            None => Err(FormulaError::syntax(start, "unknown error literal")),
        }
    }

    fn scan_quoted_reference(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        match self.match_reference() {
            Some((end, subtype)) => Ok(self.operand_to(end, subtype)),
            None => Err(FormulaError::syntax(
                start,
                "expected a reference after quoted sheet name",
            )),
        }
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance_while(|c| c.is_ascii_digit());
        if self.peek_char() == Some('.') {
            self.advance();
            self.advance_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let signed = matches!(self.peek_char_at(1), Some('+') | Some('-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_char_at(digit_at).map_or(false, |c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.advance();
                }
                self.advance_while(|c| c.is_ascii_digit());
            }
        }

        let text = &self.input[start..self.pos];
        if text == "." {
            return Err(FormulaError::syntax(start, "unexpected character '.'"));
        }
        Ok(self.token(TokenKind::Operand, TokenSubtype::Number, start))
    }

    fn scan_identifier(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        if self.peek_char() == Some('$') {
            return Err(FormulaError::syntax(start, "invalid reference"));
        }
        self.advance();
        self.advance_while(is_name_char);

        let text = &self.input[start..self.pos];
        if self.peek_char() == Some('(') {
            return Ok(self.token(TokenKind::Function, TokenSubtype::None, start));
        }
        if self.peek_char() == Some('!') {
            return Err(FormulaError::syntax(
                self.pos,
                format!("expected a reference after sheet name '{}'", text),
            ));
        }
        let subtype = if text.eq_ignore_ascii_case("TRUE") || text.eq_ignore_ascii_case("FALSE") {
            TokenSubtype::Boolean
        } else {
            TokenSubtype::Name
        };
        Ok(self.token(TokenKind::Operand, subtype, start))
    }

    // === Reference matching ===

    /// Try to match a reference starting at the current position
    ///
    /// Returns the end position and subtype without consuming input.
    fn match_reference(&self) -> Option<(usize, TokenSubtype)> {
        let s = &self.input[self.pos..];
        let mut i = 0;
        let mut subtype = TokenSubtype::Reference;
        if let Some(n) = sheet_prefix_len(s) {
            i = n;
            subtype = TokenSubtype::SheetReference;
        }

        let (n, first) = ref_part(&s[i..])?;
        i += n;
        let mut end = i;
        let mut range = false;

        if s[i..].starts_with(':') {
            let mut j = i + 1;
            if subtype == TokenSubtype::SheetReference {
                j += sheet_prefix_len(&s[j..]).unwrap_or(0);
            }
            if let Some((n, second)) = ref_part(&s[j..]) {
                if second == first && !continues_name(&s[j + n..]) {
                    end = j + n;
                    range = true;
                }
            }
        }

        if !range && first != RefPart::Cell {
            return None;
        }
        if continues_name(&s[end..]) {
            return None;
        }
        Some((self.pos + end, subtype))
    }

    // === Helpers ===

    fn operand_to(&mut self, end: usize, subtype: TokenSubtype) -> Token {
        let start = self.pos;
        self.pos = end;
        self.token(TokenKind::Operand, subtype, start)
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let start = self.pos;
        self.advance();
        self.token(kind, TokenSubtype::None, start)
    }

    fn token(&self, kind: TokenKind, subtype: TokenSubtype, start: usize) -> Token {
        Token::new(kind, subtype, &self.input[start..self.pos], start)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek_char().map_or(false, &pred) {
            self.advance();
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '\\'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// Whether text right after a candidate reference would extend it into a
/// name, a function call or a sheet prefix
fn continues_name(rest: &str) -> bool {
    rest.chars()
        .next()
        .map_or(false, |c| is_name_char(c) || c == '(' || c == '!' || c == '$')
}

/// Length of a `Sheet!` or `'Quoted Sheet'!` prefix at the start of `s`
fn sheet_prefix_len(s: &str) -> Option<usize> {
    if let Some(rest) = s.strip_prefix('\'') {
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c != '\'' {
                continue;
            }
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                continue;
            }
            let after = 1 + i + 1;
            return (i > 0 && s[after..].starts_with('!')).then_some(after + 1);
        }
        return None;
    }

    let len = s
        .char_indices()
        .find(|(_, c)| !is_name_char(*c))
        .map_or(s.len(), |(i, _)| i);
    (len > 0 && s[len..].starts_with('!')).then_some(len + 1)
}

/// Match one side of a reference: `$A$1`, `$A` or `$1`
fn ref_part(s: &str) -> Option<(usize, RefPart)> {
    let bytes = s.as_bytes();
    let mut i = 0;
    if bytes.first() == Some(&b'$') {
        i += 1;
    }
    let letters_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let letters = &s[letters_start..i];
    if !letters.is_empty() && letters_to_column(letters).is_err() {
        return None;
    }

    let mut j = i;
    if bytes.get(j) == Some(&b'$') {
        j += 1;
    }
    let digits_start = j;
    while j < bytes.len() && bytes[j].is_ascii_digit() {
        j += 1;
    }
    let digits = &s[digits_start..j];
    let valid_row = || {
        digits
            .parse::<u32>()
            .map_or(false, |row| (1..=MAX_ROWS).contains(&row))
    };

    match (letters.is_empty(), digits.is_empty()) {
        (false, false) if valid_row() => Some((j, RefPart::Cell)),
        (false, true) if j == i => Some((i, RefPart::Column)),
        (true, false) if valid_row() => Some((j, RefPart::Row)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(formula: &str) -> Vec<(TokenKind, TokenSubtype, String)> {
        tokenize(formula)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.subtype, t.text))
            .collect()
    }

    #[test]
    fn test_tokens_cover_input() {
        let formula = "IF(A1>=10, \"big \"\"one\"\"\", {1,2;3,4}) & 'My Sheet'!$B$2%";
        let tokens = tokenize(formula).unwrap();
        let joined: String = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(joined, formula);

        let mut last = None;
        for token in &tokens {
            if let Some(prev) = last {
                assert!(token.position > prev);
            }
            last = Some(token.position);
        }
    }

    #[test]
    fn test_operands() {
        use TokenKind::*;
        use TokenSubtype as S;
        assert_eq!(
            kinds("1.5e3+TRUE&\"x\"-#N/A"),
            vec![
                (Operand, S::Number, "1.5e3".to_string()),
                (Operator, S::None, "+".to_string()),
                (Operand, S::Boolean, "TRUE".to_string()),
                (Operator, S::None, "&".to_string()),
                (Operand, S::Text, "\"x\"".to_string()),
                (Operator, S::None, "-".to_string()),
                (Operand, S::Error, "#N/A".to_string()),
            ]
        );
    }

    #[test]
    fn test_references() {
        use TokenSubtype as S;
        let cases = [
            ("A1", S::Reference),
            ("$A$1:B$2", S::Reference),
            ("A:C", S::Reference),
            ("$3:$5", S::Reference),
            ("Data!A1", S::SheetReference),
            ("Data!A1:B2", S::SheetReference),
            ("'My Sheet'!A:A", S::SheetReference),
            ("'It''s'!B2", S::SheetReference),
            ("Data!A1:Data!B2", S::SheetReference),
        ];
        for (text, subtype) in cases {
            let tokens = tokenize(text).unwrap();
            assert_eq!(tokens.len(), 1, "{}", text);
            assert_eq!(tokens[0].kind, TokenKind::Operand);
            assert_eq!(tokens[0].subtype, subtype, "{}", text);
            assert_eq!(tokens[0].text, text);
        }
    }

    #[test]
    fn test_names_and_functions() {
        use TokenKind::*;
        use TokenSubtype as S;
        assert_eq!(
            kinds("LOG10(Rates)"),
            vec![
                (Function, S::None, "LOG10".to_string()),
                (OpenParen, S::None, "(".to_string()),
                (Operand, S::Name, "Rates".to_string()),
                (CloseParen, S::None, ")".to_string()),
            ]
        );
        assert_eq!(kinds("A1B")[0].1, S::Name);
        assert_eq!(kinds("ABCD1")[0].1, S::Name);
        assert_eq!(kinds("_x.y")[0].1, S::Name);
    }

    #[test]
    fn test_range_operator_between_expressions() {
        let tokens = tokenize("A1:INDEX(B:B,2)").unwrap();
        assert_eq!(tokens[0].text, "A1");
        assert!(tokens[1].is_operator(":"));
        assert_eq!(tokens[2].kind, TokenKind::Function);
        assert_eq!(tokens[4].text, "B:B");
    }

    #[test]
    fn test_comparison_operators() {
        let texts: Vec<_> = tokenize("1<>2<=3>=4<5>6=7")
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["<>", "<=", ">=", "<", ">", "="]);
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(
            tokenize("1 + \"open"),
            Err(FormulaError::syntax(4, "unterminated text literal"))
        );
        assert!(matches!(
            tokenize("1 ~ 2"),
            Err(FormulaError::Syntax { position: 2, .. })
        ));
        assert!(matches!(
            tokenize("#BOGUS!"),
            Err(FormulaError::Syntax { position: 0, .. })
        ));
        assert!(matches!(
            tokenize("'Open!A1"),
            Err(FormulaError::Syntax { position: 0, .. })
        ));
    }
}
