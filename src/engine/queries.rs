//! Read-side: searches and listings. Queries take read locks only.

use rust_decimal::Decimal;
use ulid::Ulid;

use crate::engine::availability::{check_availability, AvailabilityResult};
use crate::engine::error::EngineError;
use crate::engine::Engine;
use crate::model::*;

/// Filters for property search. All optional; an empty filter matches every
/// open property. Disabled properties never appear in search results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyFilter {
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Minimum capacity the guest needs.
    pub guests: Option<u32>,
    /// When set, only properties free for this stay.
    pub range: Option<DateRange>,
}

impl PropertyFilter {
    fn matches(&self, ps: &PropertyState) -> bool {
        if !ps.is_available {
            return false;
        }
        // Case-insensitive substring match, like an icontains lookup.
        if let Some(c) = &self.category {
            let wanted = c.to_lowercase();
            match &ps.category {
                Some(have) if have.to_lowercase().contains(&wanted) => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_price
            && ps.price_per_night < min
        {
            return false;
        }
        if let Some(max) = self.max_price
            && ps.price_per_night > max
        {
            return false;
        }
        if let Some(wanted) = self.guests
            && ps.max_guests < wanted
        {
            return false;
        }
        if let Some(range) = &self.range
            && !check_availability(ps, range).available
        {
            return false;
        }
        true
    }
}

impl Engine {
    pub async fn search_properties(&self, filter: &PropertyFilter) -> Vec<PropertyInfo> {
        let mut out = Vec::new();
        let ids: Vec<Ulid> = self.state.iter().map(|e| *e.key()).collect();
        for id in ids {
            let Some(ps) = self.get_property(&id) else { continue };
            let guard = ps.read().await;
            if filter.matches(&guard) {
                out.push(PropertyInfo {
                    id: guard.id,
                    host: guard.host,
                    title: guard.title.clone(),
                    price_per_night: guard.price_per_night,
                    max_guests: guard.max_guests,
                    category: guard.category.clone(),
                    is_available: guard.is_available,
                });
            }
        }
        out.sort_by_key(|p| p.id);
        out
    }

    /// Availability verdict for a stay, with the first failing reason.
    pub async fn check_property(
        &self,
        property_id: Ulid,
        range: &DateRange,
    ) -> Result<AvailabilityResult, EngineError> {
        let ps = self
            .get_property(&property_id)
            .ok_or(EngineError::NotFound(property_id))?;
        let guard = ps.read().await;
        Ok(check_availability(&guard, range))
    }

    /// All bookings on a property, check-in ascending.
    pub async fn property_bookings(&self, property_id: Ulid) -> Result<Vec<BookingInfo>, EngineError> {
        let ps = self
            .get_property(&property_id)
            .ok_or(EngineError::NotFound(property_id))?;
        let guard = ps.read().await;
        Ok(guard
            .bookings
            .iter()
            .map(|b| booking_info(property_id, b))
            .collect())
    }

    /// A guest's bookings across all properties.
    pub async fn guest_bookings(&self, guest: Ulid) -> Vec<BookingInfo> {
        let mut out = Vec::new();
        let ids: Vec<Ulid> = self.state.iter().map(|e| *e.key()).collect();
        for id in ids {
            let Some(ps) = self.get_property(&id) else { continue };
            let guard = ps.read().await;
            out.extend(
                guard
                    .bookings
                    .iter()
                    .filter(|b| b.guest == guest)
                    .map(|b| booking_info(id, b)),
            );
        }
        out.sort_by_key(|b| b.id);
        out
    }

    /// The property's waitlist in enqueue order.
    pub async fn property_waitlist(&self, property_id: Ulid) -> Result<Vec<WaitlistInfo>, EngineError> {
        let ps = self
            .get_property(&property_id)
            .ok_or(EngineError::NotFound(property_id))?;
        let guard = ps.read().await;
        Ok(guard
            .waitlist
            .iter()
            .map(|e| WaitlistInfo {
                id: e.id,
                property_id,
                guest: e.guest,
                created_at: e.created_at,
                notified_at: e.notified_at,
                deadline: e.deadline,
                status: e.status,
            })
            .collect())
    }

    pub async fn booking_by_session(&self, session_ref: &str) -> Result<BookingInfo, EngineError> {
        let booking_id = self
            .session_to_booking
            .get(session_ref)
            .map(|e| *e.value())
            .ok_or_else(|| EngineError::UnknownSession(session_ref.to_string()))?;
        let property_id = self
            .property_for_booking(&booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        let ps = self
            .get_property(&property_id)
            .ok_or(EngineError::NotFound(property_id))?;
        let guard = ps.read().await;
        guard
            .booking(booking_id)
            .map(|b| booking_info(property_id, b))
            .ok_or(EngineError::NotFound(booking_id))
    }
}

fn booking_info(property_id: Ulid, b: &Booking) -> BookingInfo {
    BookingInfo {
        id: b.id,
        property_id,
        guest: b.guest,
        check_in: b.range.check_in,
        check_out: b.range.check_out,
        total_price: b.total_price,
        status: b.status,
        is_paid: b.is_paid,
        session_ref: b.session_ref.clone(),
    }
}
