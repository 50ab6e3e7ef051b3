//! Named range definitions
//!
//! Defined names give a range a meaningful label that formulas can use in
//! place of reference text.
//!
//! # Example
//!
//! ```text
//! workbook.define_name("TaxRate", "Sheet1!$B$1")?;
//!
//! =Price * TaxRate
//! ```

use crate::cell::{CellCoord, RangeAddress};
use crate::error::{Error, Result};
use ahash::AHashMap;

/// A named range definition
#[derive(Debug, Clone, PartialEq)]
pub struct NamedRange {
    /// The name as written when defined (e.g., "SalesData")
    pub name: String,
    /// The range the name refers to
    pub refers_to: RangeAddress,
    /// Optional comment/description for documentation
    pub comment: Option<String>,
}

impl NamedRange {
    /// Create a new named range
    pub fn new(name: impl Into<String>, refers_to: RangeAddress) -> Self {
        Self {
            name: name.into(),
            refers_to,
            comment: None,
        }
    }

    /// Set a comment for this named range
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Check that `name` can be used as a defined name
///
/// Names start with a letter, `_` or `\`, continue with letters, digits,
/// `_` or `.`, and must not read as a cell reference or a boolean.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| Err(Error::InvalidName(format!("'{}': {}", name, reason)));

    let mut chars = name.chars();
    match chars.next() {
        None => return invalid("name cannot be empty"),
        Some(c) if c.is_alphabetic() || c == '_' || c == '\\' => {}
        Some(_) => return invalid("must start with a letter, '_' or '\\'"),
    }
    if !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return invalid("contains an invalid character");
    }
    if CellCoord::parse_a1(name).is_ok() {
        return invalid("looks like a cell reference");
    }
    if name.eq_ignore_ascii_case("TRUE") || name.eq_ignore_ascii_case("FALSE") {
        return invalid("reserved word");
    }
    Ok(())
}

/// Collection of named ranges with case-insensitive lookup
#[derive(Debug, Default, Clone)]
pub struct NamedRangeCollection {
    /// Keyed by upper-cased name
    ranges: AHashMap<String, NamedRange>,
}

impl NamedRangeCollection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a new named range
    ///
    /// Returns an error if the name is invalid or already defined.
    pub fn define(&mut self, range: NamedRange) -> Result<()> {
        validate_name(&range.name)?;
        let key = range.name.to_uppercase();
        if self.ranges.contains_key(&key) {
            return Err(Error::InvalidName(format!(
                "'{}' is already defined",
                range.name
            )));
        }
        self.ranges.insert(key, range);
        Ok(())
    }

    /// Define or replace a named range
    pub fn define_or_update(&mut self, range: NamedRange) -> Result<()> {
        validate_name(&range.name)?;
        self.ranges.insert(range.name.to_uppercase(), range);
        Ok(())
    }

    /// Get a named range by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&NamedRange> {
        self.ranges.get(&name.to_uppercase())
    }

    /// Remove a named range
    pub fn remove(&mut self, name: &str) -> Option<NamedRange> {
        self.ranges.remove(&name.to_uppercase())
    }

    /// Iterate over all named ranges
    pub fn iter(&self) -> impl Iterator<Item = &NamedRange> {
        self.ranges.values()
    }

    /// Get the number of named ranges
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
