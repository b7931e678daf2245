//! Hard limits. Everything here exists to keep a single misbehaving client
//! from exhausting memory or disk for a whole tenant.

use chrono::NaiveDate;

use crate::model::Ms;

pub const MAX_PROPERTIES_PER_TENANT: usize = 100_000;
pub const MAX_BOOKINGS_PER_PROPERTY: usize = 10_000;
pub const MAX_WAITLIST_PER_PROPERTY: usize = 1_000;
pub const MAX_CONVERSATIONS_PER_TENANT: usize = 100_000;
pub const MAX_MESSAGES_PER_CONVERSATION: usize = 10_000;

pub const MAX_TITLE_LEN: usize = 50;
pub const MAX_CATEGORY_LEN: usize = 50;
pub const MAX_MESSAGE_LEN: usize = 4_096;

/// Longest bookable stay, in nights.
pub const MAX_STAY_NIGHTS: i64 = 365;

pub const MAX_TENANTS: usize = 64;
pub const MAX_TENANT_NAME_LEN: usize = 128;

/// Waitlist holding window: how long a notified guest has to confirm.
pub const DEFAULT_HOLD_WINDOW_MS: Ms = 86_400_000; // 24h

/// All stay dates must fall inside this window.
pub const MIN_BOOK_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2000, 1, 1) {
    Some(d) => d,
    None => unreachable!(),
};
pub const MAX_BOOK_DATE: NaiveDate = match NaiveDate::from_ymd_opt(2100, 1, 1) {
    Some(d) => d,
    None => unreachable!(),
};

/// Checkout sessions are denominated in this currency's minor units.
pub const CURRENCY: &str = "dzd";
