use serde::{Deserialize, Serialize};

use crate::model::*;

// ── Availability evaluation ──────────────────────────────────────

/// Why a range cannot be booked. One distinct reason per check so callers
/// can render a precise message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnavailableReason {
    InvalidRange,
    PropertyDisabled,
    BeforeWindow,
    AfterWindow,
    DateBlocked,
    OverlappingBooking,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnavailableReason::InvalidRange => "check-out must be after check-in",
            UnavailableReason::PropertyDisabled => "property is not open for booking",
            UnavailableReason::BeforeWindow => "stay starts before the property's availability window",
            UnavailableReason::AfterWindow => "stay ends after the property's availability window",
            UnavailableReason::DateBlocked => "a requested date is blocked by the host",
            UnavailableReason::OverlappingBooking => "an existing booking overlaps these dates",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityResult {
    pub available: bool,
    pub reason: Option<UnavailableReason>,
}

impl AvailabilityResult {
    fn ok() -> Self {
        Self { available: true, reason: None }
    }

    fn no(reason: UnavailableReason) -> Self {
        Self { available: false, reason: Some(reason) }
    }
}

/// Decide whether `range` is bookable on `property`.
///
/// Pure read over the property snapshot: no locking, no reservation.
/// Checks run in a fixed order and short-circuit on the first failure.
pub fn check_availability(property: &PropertyState, range: &DateRange) -> AvailabilityResult {
    if range.nights() <= 0 {
        return AvailabilityResult::no(UnavailableReason::InvalidRange);
    }

    if !property.is_available {
        return AvailabilityResult::no(UnavailableReason::PropertyDisabled);
    }

    if let Some(from) = property.available_from
        && range.check_in < from
    {
        return AvailabilityResult::no(UnavailableReason::BeforeWindow);
    }

    if let Some(to) = property.available_to
        && range.check_out > to
    {
        return AvailabilityResult::no(UnavailableReason::AfterWindow);
    }

    if !property.blocked_dates.is_empty()
        && range.dates().any(|d| property.blocked_dates.contains(&d))
    {
        return AvailabilityResult::no(UnavailableReason::DateBlocked);
    }

    if property.overlapping(range).next().is_some() {
        return AvailabilityResult::no(UnavailableReason::OverlappingBooking);
    }

    AvailabilityResult::ok()
}
