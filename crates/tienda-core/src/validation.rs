//! # Validation Module
//!
//! Input validation utilities for Tienda POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractor (axum Json / Query)                           │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Business rule validation (names, quantities, amounts, dates)      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (non-negative money, status enums)              │
//! │  ├── UNIQUE constraints (sku, credit note code, remote order id)       │
//! │  └── Partial unique index (one open cash session)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tienda_core::validation::{parse_size_list, validate_quantity};
//!
//! assert_eq!(parse_size_list("S, M ,L").unwrap(), vec!["S", "M", "L"]);
//! assert!(validate_quantity(0).is_err());
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::{DEFAULT_SIZE, MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - No whitespace (scanners send the SKU verbatim)
///
/// ```rust
/// use tienda_core::validation::validate_sku;
///
/// assert!(validate_sku("P12-XL").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("P12 XL").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if sku.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must not contain spaces".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, category, customer) and returns it trimmed.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(name.to_string())
}

/// Splits a search box value into terms.
///
/// Every term must match somewhere for a product to be returned, so
/// "boca retro" finds products matching both words.
pub fn search_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .take(10)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Parses a comma-separated size list (`"S,M,L"`, `"4,6,8"`).
///
/// Blank input yields the single default size. Duplicates are rejected
/// because `(product, size)` is unique.
pub fn parse_size_list(input: &str) -> ValidationResult<Vec<String>> {
    if input.trim().is_empty() {
        return Ok(vec![DEFAULT_SIZE.to_string()]);
    }

    let mut sizes: Vec<String> = Vec::new();
    for raw in input.split(',') {
        let size = raw.trim();
        if size.is_empty() {
            return Err(ValidationError::InvalidFormat {
                field: "sizes".to_string(),
                reason: "contains an empty size".to_string(),
            });
        }
        if sizes.iter().any(|s| s.eq_ignore_ascii_case(size)) {
            return Err(ValidationError::InvalidFormat {
                field: "sizes".to_string(),
                reason: format!("size '{}' is repeated", size),
            });
        }
        sizes.push(size.to_string());
    }

    Ok(sizes)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity (1..=MAX_ITEM_QUANTITY).
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a price (zero allowed for giveaways, at most MAX_PRICE_CENTS).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::Negative {
            field: "price_cents".to_string(),
        });
    }
    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "price_cents".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }
    Ok(())
}

/// Validates an absolute stock count.
pub fn validate_stock_count(count: i64) -> ValidationResult<()> {
    if count < 0 {
        return Err(ValidationError::Negative {
            field: "stock".to_string(),
        });
    }
    Ok(())
}

/// Validates a strictly positive money amount.
pub fn validate_positive_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::must_be_positive(field));
    }
    Ok(())
}

/// Validates a non-negative money amount.
pub fn validate_non_negative_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates the number of lines in a cart, reservation or quote.
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Empty {
            field: "items".to_string(),
        });
    }
    if lines > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Dates
// =============================================================================

/// Parses an inclusive `YYYY-MM-DD` range.
pub fn parse_date_range(start: &str, end: &str) -> ValidationResult<(NaiveDate, NaiveDate)> {
    let start = parse_date("start_date", start)?;
    let end = parse_date("end_date", end)?;
    if end < start {
        return Err(ValidationError::InvalidFormat {
            field: "end_date".to_string(),
            reason: "must not be before start_date".to_string(),
        });
    }
    Ok((start, end))
}

fn parse_date(field: &str, value: &str) -> ValidationResult<NaiveDate> {
    if value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected YYYY-MM-DD".to_string(),
        }
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("P1-U").is_ok());
        assert!(validate_sku("  ").is_err());
        assert!(validate_sku(&"X".repeat(51)).is_err());
        assert!(validate_sku("A B").is_err());
    }

    #[test]
    fn test_validate_name_trims() {
        assert_eq!(validate_name("name", "  Remera Boca ").unwrap(), "Remera Boca");
        assert_eq!(
            validate_name("name", ""),
            Err(ValidationError::required("name"))
        );
    }

    #[test]
    fn test_search_terms() {
        assert_eq!(search_terms("  Boca   RETRO "), vec!["boca", "retro"]);
        assert!(search_terms("   ").is_empty());
    }

    #[test]
    fn test_parse_size_list() {
        assert_eq!(parse_size_list("").unwrap(), vec!["U"]);
        assert_eq!(parse_size_list("4,6, 8").unwrap(), vec!["4", "6", "8"]);
        assert!(parse_size_list("S,,M").is_err());
        assert!(parse_size_list("S,M,s").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_amounts() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_price_cents(i64::MAX / 2).is_err());
        assert!(validate_positive_amount("amount", 1).is_ok());
        assert!(validate_positive_amount("amount", 0).is_err());
        assert!(validate_non_negative_amount("deposit", 0).is_ok());
        assert!(validate_stock_count(-3).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(1).is_ok());
        assert!(validate_cart_size(0).is_err());
        assert!(validate_cart_size(MAX_CART_ITEMS + 1).is_err());
    }

    #[test]
    fn test_parse_date_range() {
        let (start, end) = parse_date_range("2026-01-01", "2026-01-31").unwrap();
        assert_eq!(start.to_string(), "2026-01-01");
        assert_eq!(end.to_string(), "2026-01-31");
        assert!(parse_date_range("2026-02-01", "2026-01-01").is_err());
        assert!(parse_date_range("01/02/2026", "2026-01-01").is_err());
        assert!(parse_date_range("", "2026-01-01").is_err());
    }
}
