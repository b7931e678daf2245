use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::engine::availability::UnavailableReason;
use crate::engine::error::EngineError;
use crate::limits;
use crate::model::{DateRange, Ms};

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

/// Sanity bounds on a requested stay, independent of any property.
pub fn validate_range(range: &DateRange) -> Result<(), EngineError> {
    let nights = range.nights();
    if nights <= 0 {
        return Err(EngineError::Unavailable(UnavailableReason::InvalidRange));
    }
    if nights > limits::MAX_STAY_NIGHTS {
        return Err(EngineError::InvalidRange);
    }
    if range.check_in < limits::MIN_BOOK_DATE || range.check_out > limits::MAX_BOOK_DATE {
        return Err(EngineError::InvalidRange);
    }
    Ok(())
}

/// Nightly prices must be positive with at most two decimal places, so the
/// minor-unit conversion for checkout sessions is always exact.
pub fn validate_price(price: Decimal) -> Result<(), EngineError> {
    if price <= Decimal::ZERO {
        return Err(EngineError::InvalidPrice(format!(
            "price must be positive, got {price}"
        )));
    }
    if price.scale() > 2 {
        return Err(EngineError::InvalidPrice(format!(
            "price has more than two decimal places: {price}"
        )));
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), EngineError> {
    if title.is_empty() || title.len() > limits::MAX_TITLE_LEN {
        return Err(EngineError::LimitExceeded("title length"));
    }
    Ok(())
}

pub fn validate_category(category: &Option<String>) -> Result<(), EngineError> {
    if let Some(c) = category
        && c.len() > limits::MAX_CATEGORY_LEN
    {
        return Err(EngineError::LimitExceeded("category length"));
    }
    Ok(())
}

/// `available_from..=available_to` must be a coherent window when both ends
/// are set.
pub fn validate_window(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(), EngineError> {
    if let (Some(f), Some(t)) = (from, to)
        && f > t
    {
        return Err(EngineError::InvalidRange);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn empty_range_rejected() {
        let r = DateRange::new(d(2026, 6, 1), d(2026, 6, 1));
        assert_eq!(
            validate_range(&r),
            Err(EngineError::Unavailable(UnavailableReason::InvalidRange))
        );
    }

    #[test]
    fn overlong_stay_rejected() {
        let r = DateRange::new(d(2026, 1, 1), d(2027, 6, 1));
        assert_eq!(validate_range(&r), Err(EngineError::InvalidRange));
    }

    #[test]
    fn normal_stay_accepted() {
        let r = DateRange::new(d(2026, 6, 1), d(2026, 6, 8));
        assert_eq!(validate_range(&r), Ok(()));
    }

    #[test]
    fn price_scale_enforced() {
        assert!(validate_price(dec!(120.00)).is_ok());
        assert!(validate_price(dec!(120.5)).is_ok());
        assert!(validate_price(dec!(120.505)).is_err());
        assert!(validate_price(dec!(0)).is_err());
        assert!(validate_price(dec!(-3)).is_err());
    }

    #[test]
    fn window_ordering_enforced() {
        assert!(validate_window(Some(d(2026, 1, 1)), Some(d(2026, 2, 1))).is_ok());
        assert!(validate_window(None, Some(d(2026, 2, 1))).is_ok());
        assert!(validate_window(Some(d(2026, 3, 1)), Some(d(2026, 2, 1))).is_err());
    }
}
