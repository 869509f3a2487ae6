//! Numeric extraction from noisy, annotated sheet cells.

use crate::models::Cell;
use once_cell::sync::Lazy;
use regex::Regex;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static PAREN_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d+)\)").unwrap());
static LEADING_FLOAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[+-]?(\d+\.?\d*|\.\d+)").unwrap());

/// First run of ASCII digits anywhere in `text`, parsed as an integer.
///
/// Annotation characters around the digits are ignored, so `"2*"`, `"(3)"` and
/// `"등급 4"` all yield a value. Text without any digit run, and runs too large
/// for `u32`, yield `None`, never zero.
pub fn first_integer(text: &str) -> Option<u32> {
    DIGIT_RUN
        .find(text)
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// [`first_integer`] applied to the string form of a cell.
pub fn cell_integer(cell: &Cell) -> Option<u32> {
    cell.as_text().and_then(|t| first_integer(&t))
}

/// Leading decimal number of `text`, ignoring anything after it.
///
/// `"71.2점"` reads as `71.2`; text that does not start with a number is `None`.
pub fn leading_float(text: &str) -> Option<f64> {
    LEADING_FLOAT
        .find(text)
        .and_then(|m| m.as_str().trim().parse::<f64>().ok())
}

/// Numeric cells as-is, text cells through [`leading_float`].
pub fn cell_float(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) => Some(*n),
        Cell::Text(t) => leading_float(t),
        Cell::Empty => None,
    }
}

/// Score recorded in a combined `"<raw>(<score>)"` cell.
///
/// The value outside the parentheses is discarded.
pub fn parenthesized_integer(cell: &Cell) -> Option<u32> {
    let text = cell.as_text()?;
    PAREN_INT
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_integer_ignores_annotations() {
        assert_eq!(first_integer("2"), Some(2));
        assert_eq!(first_integer(" 3* "), Some(3));
        assert_eq!(first_integer("rank: 12 of 40"), Some(12));
        assert_eq!(first_integer("(7)"), Some(7));
    }

    #[test]
    fn first_integer_absent_without_digits() {
        assert_eq!(first_integer(""), None);
        assert_eq!(first_integer("P"), None);
        assert_eq!(first_integer("-"), None);
    }

    #[test]
    fn cell_integer_reads_numbers_and_text() {
        assert_eq!(cell_integer(&Cell::Number(4.0)), Some(4));
        assert_eq!(cell_integer(&Cell::Text("1등급".to_string())), Some(1));
        assert_eq!(cell_integer(&Cell::Empty), None);
    }

    #[test]
    fn leading_float_reads_number_prefix() {
        assert_eq!(leading_float("71.2점"), Some(71.2));
        assert_eq!(leading_float(" 58 "), Some(58.0));
        assert_eq!(leading_float("-3.5x"), Some(-3.5));
        assert_eq!(leading_float(".5"), Some(0.5));
        assert_eq!(leading_float("평균 70"), None);
        assert_eq!(leading_float(""), None);
        assert_eq!(cell_float(&Cell::Number(61.25)), Some(61.25));
        assert_eq!(cell_float(&Cell::Empty), None);
    }

    #[test]
    fn parenthesized_score_discards_outer_value() {
        assert_eq!(
            parenthesized_integer(&Cell::Text("87.5(92)".to_string())),
            Some(92)
        );
        assert_eq!(parenthesized_integer(&Cell::Text("92".to_string())), None);
        assert_eq!(parenthesized_integer(&Cell::Number(92.0)), None);
    }
}
