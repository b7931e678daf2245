use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only timestamp type.
pub type Ms = i64;

/// Half-open stay range `[check_in, check_out)`. Adjacent stays may touch
/// without conflicting: one guest checks out the morning another checks in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl DateRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        Self { check_in, check_out }
    }

    /// Number of nights. Zero or negative means the range is invalid.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    pub fn contains_date(&self, d: NaiveDate) -> bool {
        self.check_in <= d && d < self.check_out
    }

    /// Every stay date in the range (check_out itself excluded).
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let nights = self.nights().max(0) as u64;
        (0..nights).filter_map(|n| self.check_in.checked_add_days(Days::new(n)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Card,
    Transfer,
}

/// A stay reservation on a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub guest: Ulid,
    pub range: DateRange,
    /// `price_per_night * nights`, fixed at creation.
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub is_paid: bool,
    pub payment_method: PaymentMethod,
    /// Opaque checkout-session handle from the payment gateway.
    pub session_ref: Option<String>,
    pub created_at: Ms,
}

impl Booking {
    /// Pending and confirmed bookings hold their dates; canceled ones don't.
    pub fn blocks_dates(&self) -> bool {
        matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitlistStatus {
    Enqueued,
    Notified,
    Confirmed,
    Expired,
    Withdrawn,
}

/// One guest's place in a property's waitlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitListEntry {
    pub id: Ulid,
    pub guest: Ulid,
    /// FIFO promotion key.
    pub created_at: Ms,
    pub notified_at: Option<Ms>,
    /// Set together with `notified_at`; confirmation past this always fails.
    pub deadline: Option<Ms>,
    pub status: WaitlistStatus,
}

impl WaitListEntry {
    /// Active entries block the guest from enqueueing again.
    pub fn is_active(&self) -> bool {
        matches!(self.status, WaitlistStatus::Enqueued | WaitlistStatus::Notified)
    }
}

#[derive(Debug, Clone)]
pub struct PropertyState {
    pub id: Ulid,
    pub host: Ulid,
    pub title: String,
    pub price_per_night: Decimal,
    pub max_guests: u32,
    pub category: Option<String>,
    pub available_from: Option<NaiveDate>,
    pub available_to: Option<NaiveDate>,
    pub blocked_dates: BTreeSet<NaiveDate>,
    pub is_available: bool,
    /// All bookings (including canceled), sorted by `range.check_in`.
    pub bookings: Vec<Booking>,
    /// Waitlist in enqueue order (`created_at` ascending).
    pub waitlist: Vec<WaitListEntry>,
}

impl PropertyState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Ulid,
        host: Ulid,
        title: String,
        price_per_night: Decimal,
        max_guests: u32,
        category: Option<String>,
        available_from: Option<NaiveDate>,
        available_to: Option<NaiveDate>,
    ) -> Self {
        Self {
            id,
            host,
            title,
            price_per_night,
            max_guests,
            category,
            available_from,
            available_to,
            blocked_dates: BTreeSet::new(),
            is_available: true,
            bookings: Vec::new(),
            waitlist: Vec::new(),
        }
    }

    /// Insert a booking maintaining sort order by check-in date.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.range.check_in, |b| b.range.check_in)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Date-holding bookings whose range overlaps the query.
    /// Binary search skips bookings starting at or after `query.check_out`.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.range.check_in < query.check_out);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.blocks_dates() && b.range.check_out > query.check_in)
    }

    pub fn entry(&self, id: Ulid) -> Option<&WaitListEntry> {
        self.waitlist.iter().find(|e| e.id == id)
    }

    pub fn entry_mut(&mut self, id: Ulid) -> Option<&mut WaitListEntry> {
        self.waitlist.iter_mut().find(|e| e.id == id)
    }

    /// The guest's active waitlist entry, if any.
    pub fn active_entry_for(&self, guest: Ulid) -> Option<&WaitListEntry> {
        self.waitlist.iter().find(|e| e.guest == guest && e.is_active())
    }

    /// Next entry in line for promotion: oldest enqueued, FIFO.
    pub fn next_in_line(&self) -> Option<&WaitListEntry> {
        self.waitlist
            .iter()
            .filter(|e| e.status == WaitlistStatus::Enqueued)
            .min_by_key(|e| e.created_at)
    }
}

/// A property-scoped thread between a guest and the host.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: Ulid,
    pub property_id: Ulid,
    /// Always host + guest.
    pub participants: [Ulid; 2],
    pub created_at: Ms,
    /// Ordered by creation; messages are immutable once sent.
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn is_participant(&self, user: Ulid) -> bool {
        self.participants.contains(&user)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Ulid,
    pub sender: Ulid,
    pub content: String,
    pub created_at: Ms,
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    PropertyListed {
        id: Ulid,
        host: Ulid,
        title: String,
        price_per_night: Decimal,
        max_guests: u32,
        category: Option<String>,
        available_from: Option<NaiveDate>,
        available_to: Option<NaiveDate>,
    },
    PropertyUpdated {
        id: Ulid,
        price_per_night: Decimal,
        max_guests: u32,
        available_from: Option<NaiveDate>,
        available_to: Option<NaiveDate>,
        is_available: bool,
    },
    PropertyDelisted {
        id: Ulid,
    },
    DatesBlocked {
        property_id: Ulid,
        dates: Vec<NaiveDate>,
    },
    DatesUnblocked {
        property_id: Ulid,
        dates: Vec<NaiveDate>,
    },
    BookingCreated {
        id: Ulid,
        property_id: Ulid,
        guest: Ulid,
        range: DateRange,
        total_price: Decimal,
        payment_method: PaymentMethod,
        session_ref: Option<String>,
        created_at: Ms,
    },
    PaymentConfirmed {
        booking_id: Ulid,
        property_id: Ulid,
    },
    BookingCanceled {
        booking_id: Ulid,
        property_id: Ulid,
    },
    WaitlistJoined {
        id: Ulid,
        property_id: Ulid,
        guest: Ulid,
        created_at: Ms,
    },
    WaitlistNotified {
        entry_id: Ulid,
        property_id: Ulid,
        notified_at: Ms,
        deadline: Ms,
    },
    WaitlistConfirmed {
        entry_id: Ulid,
        property_id: Ulid,
    },
    WaitlistExpired {
        entry_id: Ulid,
        property_id: Ulid,
    },
    WaitlistWithdrawn {
        entry_id: Ulid,
        property_id: Ulid,
    },
    ConversationOpened {
        id: Ulid,
        property_id: Ulid,
        participants: [Ulid; 2],
        created_at: Ms,
    },
    MessageSent {
        id: Ulid,
        conversation_id: Ulid,
        sender: Ulid,
        content: String,
        created_at: Ms,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub id: Ulid,
    pub host: Ulid,
    pub title: String,
    pub price_per_night: Decimal,
    pub max_guests: u32,
    pub category: Option<String>,
    pub is_available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingInfo {
    pub id: Ulid,
    pub property_id: Ulid,
    pub guest: Ulid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub is_paid: bool,
    pub session_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitlistInfo {
    pub id: Ulid,
    pub property_id: Ulid,
    pub guest: Ulid,
    pub created_at: Ms,
    pub notified_at: Option<Ms>,
    pub deadline: Option<Ms>,
    pub status: WaitlistStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    pub id: Ulid,
    pub conversation_id: Ulid,
    pub sender: Ulid,
    pub content: String,
    pub created_at: Ms,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn range(ci: NaiveDate, co: NaiveDate) -> DateRange {
        DateRange::new(ci, co)
    }

    fn booking(ci: NaiveDate, co: NaiveDate, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            guest: Ulid::new(),
            range: range(ci, co),
            total_price: dec!(100),
            status,
            is_paid: false,
            payment_method: PaymentMethod::Card,
            session_ref: None,
            created_at: 0,
        }
    }

    fn make_property() -> PropertyState {
        PropertyState::new(
            Ulid::new(),
            Ulid::new(),
            "Seaside flat".into(),
            dec!(100.00),
            2,
            None,
            None,
            None,
        )
    }

    #[test]
    fn range_basics() {
        let r = range(d(2025, 6, 1), d(2025, 6, 3));
        assert_eq!(r.nights(), 2);
        assert!(r.contains_date(d(2025, 6, 1)));
        assert!(r.contains_date(d(2025, 6, 2)));
        assert!(!r.contains_date(d(2025, 6, 3))); // half-open
    }

    #[test]
    fn range_overlap() {
        let a = range(d(2025, 6, 1), d(2025, 6, 3));
        let b = range(d(2025, 6, 2), d(2025, 6, 4));
        let c = range(d(2025, 6, 3), d(2025, 6, 5));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // touching boundary, no overlap
        assert!(b.overlaps(&c));
    }

    #[test]
    fn range_inverted_has_no_nights() {
        let r = range(d(2025, 6, 3), d(2025, 6, 1));
        assert!(r.nights() < 0);
        assert_eq!(r.dates().count(), 0);
    }

    #[test]
    fn range_dates_enumeration() {
        let r = range(d(2025, 6, 1), d(2025, 6, 4));
        let days: Vec<_> = r.dates().collect();
        assert_eq!(days, vec![d(2025, 6, 1), d(2025, 6, 2), d(2025, 6, 3)]);
    }

    #[test]
    fn booking_ordering() {
        let mut p = make_property();
        p.insert_booking(booking(d(2025, 7, 1), d(2025, 7, 3), BookingStatus::Pending));
        p.insert_booking(booking(d(2025, 6, 1), d(2025, 6, 3), BookingStatus::Pending));
        p.insert_booking(booking(d(2025, 6, 10), d(2025, 6, 12), BookingStatus::Pending));
        assert_eq!(p.bookings[0].range.check_in, d(2025, 6, 1));
        assert_eq!(p.bookings[1].range.check_in, d(2025, 6, 10));
        assert_eq!(p.bookings[2].range.check_in, d(2025, 7, 1));
    }

    #[test]
    fn overlapping_skips_canceled() {
        let mut p = make_property();
        p.insert_booking(booking(d(2025, 6, 1), d(2025, 6, 5), BookingStatus::Canceled));
        let query = range(d(2025, 6, 2), d(2025, 6, 4));
        assert_eq!(p.overlapping(&query).count(), 0);
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        let mut p = make_property();
        p.insert_booking(booking(d(2025, 6, 1), d(2025, 6, 3), BookingStatus::Confirmed));
        let query = range(d(2025, 6, 3), d(2025, 6, 5));
        assert_eq!(p.overlapping(&query).count(), 0);
    }

    #[test]
    fn overlapping_finds_pending_and_confirmed() {
        let mut p = make_property();
        p.insert_booking(booking(d(2025, 6, 1), d(2025, 6, 3), BookingStatus::Pending));
        p.insert_booking(booking(d(2025, 6, 5), d(2025, 6, 8), BookingStatus::Confirmed));
        p.insert_booking(booking(d(2025, 6, 20), d(2025, 6, 22), BookingStatus::Confirmed));
        let query = range(d(2025, 6, 2), d(2025, 6, 6));
        assert_eq!(p.overlapping(&query).count(), 2);
    }

    #[test]
    fn next_in_line_is_fifo() {
        let mut p = make_property();
        let (g1, g2) = (Ulid::new(), Ulid::new());
        p.waitlist.push(WaitListEntry {
            id: Ulid::new(),
            guest: g2,
            created_at: 200,
            notified_at: None,
            deadline: None,
            status: WaitlistStatus::Enqueued,
        });
        p.waitlist.push(WaitListEntry {
            id: Ulid::new(),
            guest: g1,
            created_at: 100,
            notified_at: None,
            deadline: None,
            status: WaitlistStatus::Enqueued,
        });
        assert_eq!(p.next_in_line().unwrap().guest, g1);
    }

    #[test]
    fn next_in_line_skips_notified_and_inactive() {
        let mut p = make_property();
        let late = Ulid::new();
        p.waitlist.push(WaitListEntry {
            id: Ulid::new(),
            guest: Ulid::new(),
            created_at: 100,
            notified_at: Some(150),
            deadline: Some(250),
            status: WaitlistStatus::Notified,
        });
        p.waitlist.push(WaitListEntry {
            id: Ulid::new(),
            guest: Ulid::new(),
            created_at: 120,
            notified_at: None,
            deadline: None,
            status: WaitlistStatus::Withdrawn,
        });
        p.waitlist.push(WaitListEntry {
            id: late,
            guest: Ulid::new(),
            created_at: 300,
            notified_at: None,
            deadline: None,
            status: WaitlistStatus::Enqueued,
        });
        assert_eq!(p.next_in_line().unwrap().id, late);
    }

    #[test]
    fn active_entry_ignores_settled_states() {
        let mut p = make_property();
        let guest = Ulid::new();
        p.waitlist.push(WaitListEntry {
            id: Ulid::new(),
            guest,
            created_at: 100,
            notified_at: Some(110),
            deadline: Some(120),
            status: WaitlistStatus::Expired,
        });
        assert!(p.active_entry_for(guest).is_none());

        p.waitlist.push(WaitListEntry {
            id: Ulid::new(),
            guest,
            created_at: 130,
            notified_at: None,
            deadline: None,
            status: WaitlistStatus::Enqueued,
        });
        assert!(p.active_entry_for(guest).is_some());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingCreated {
            id: Ulid::new(),
            property_id: Ulid::new(),
            guest: Ulid::new(),
            range: range(d(2025, 6, 1), d(2025, 6, 3)),
            total_price: dec!(199.98),
            payment_method: PaymentMethod::Card,
            session_ref: Some("cs_test_123".into()),
            created_at: 1_750_000_000_000,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
