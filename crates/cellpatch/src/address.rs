//! A1-style cell references

use std::fmt;

use crate::error::{PatchError, PatchResult};

/// Number of columns in a worksheet (A..XFD)
pub const MAX_COLS: u32 = 16_384;

/// Number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// A cell reference such as `J7`.
///
/// Rows are 1-based as they appear in the worksheet XML; columns are 0-based
/// (A = 0) so they order naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    /// Row number (1-based)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., XFD=16383)
    pub col: u32,
}

impl CellRef {
    /// Create a reference from a 1-based row and 0-based column
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse an A1-style reference. `$` markers are accepted and ignored.
    ///
    /// ```
    /// use cellpatch::CellRef;
    ///
    /// let r = CellRef::parse("K12").unwrap();
    /// assert_eq!(r.row, 12);
    /// assert_eq!(r.col, 10);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let bytes = s.as_bytes();
        let mut pos = 0;

        if bytes.get(pos) == Some(&b'$') {
            pos += 1;
        }
        let col_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        let col = letters_to_column(&s[col_start..pos]).ok()?;

        if bytes.get(pos) == Some(&b'$') {
            pos += 1;
        }
        let row_str = &s[pos..];
        if row_str.is_empty() || !row_str.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let row: u32 = row_str.parse().ok()?;
        if row == 0 || row > MAX_ROWS {
            return None;
        }

        Some(Self { row, col })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_to_letters(self.col), self.row)
    }
}

/// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
pub fn column_to_letters(col: u32) -> String {
    let mut result = String::new();
    let mut n = col + 1;

    while n > 0 {
        n -= 1;
        result.insert(0, ((n % 26) as u8 + b'A') as char);
        n /= 26;
    }

    result
}

/// Convert column letters to index (A = 0, Z = 25, AA = 26, etc.)
///
/// Letters are case-insensitive. Anything other than `A`..`XFD` is rejected.
pub fn letters_to_column(letters: &str) -> PatchResult<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return Err(PatchError::InvalidColumn(letters.to_string()));
    }

    let mut col: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(PatchError::InvalidColumn(letters.to_string()));
        }
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }

    let col = col - 1;
    if col >= MAX_COLS {
        return Err(PatchError::InvalidColumn(letters.to_string()));
    }

    Ok(col)
}
