//! Property listings and the booking lifecycle.
//!
//! Every mutation takes the property's write lock, validates against current
//! state, appends to the WAL, then applies in memory. Holding the lock across
//! all three steps is what makes double-booking impossible: two concurrent
//! requests for overlapping dates serialize on the lock, and the second sees
//! the first's booking when it validates.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::engine::availability::check_availability;
use crate::engine::error::EngineError;
use crate::engine::validate::{
    now_ms, validate_category, validate_price, validate_range, validate_title, validate_window,
};
use crate::engine::Engine;
use crate::limits;
use crate::model::*;
use crate::payment::{CheckoutSession, SessionStatus};

/// Partial update for a listing. `None` leaves a field alone; the nested
/// `Option` on the window fields distinguishes "clear" from "keep".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyPatch {
    pub price_per_night: Option<Decimal>,
    pub max_guests: Option<u32>,
    pub available_from: Option<Option<NaiveDate>>,
    pub available_to: Option<Option<NaiveDate>>,
    pub is_available: Option<bool>,
}

impl Engine {
    pub async fn list_property(
        &self,
        host: Ulid,
        title: String,
        price_per_night: Decimal,
        max_guests: u32,
        category: Option<String>,
        available_from: Option<NaiveDate>,
        available_to: Option<NaiveDate>,
    ) -> Result<Ulid, EngineError> {
        validate_title(&title)?;
        validate_category(&category)?;
        validate_price(price_per_night)?;
        validate_window(available_from, available_to)?;
        if max_guests == 0 {
            return Err(EngineError::LimitExceeded("max_guests"));
        }
        if self.state.len() >= limits::MAX_PROPERTIES_PER_TENANT {
            return Err(EngineError::LimitExceeded("properties per tenant"));
        }

        let id = Ulid::new();
        let event = Event::PropertyListed {
            id,
            host,
            title: title.clone(),
            price_per_night,
            max_guests,
            category: category.clone(),
            available_from,
            available_to,
        };
        self.wal_append(&event).await?;

        let ps = PropertyState::new(
            id,
            host,
            title,
            price_per_night,
            max_guests,
            category,
            available_from,
            available_to,
        );
        self.state
            .insert(id, std::sync::Arc::new(tokio::sync::RwLock::new(ps)));
        self.notify.send_event(id, &event);

        metrics::counter!(crate::observability::PROPERTIES_LISTED_TOTAL).increment(1);
        debug!(%id, %host, "property listed");
        Ok(id)
    }

    /// Patch a listing. Unset fields keep their current value; the merge
    /// happens under the property write lock, so concurrent patches can't
    /// clobber each other.
    pub async fn update_property(
        &self,
        property_id: Ulid,
        actor: Ulid,
        patch: PropertyPatch,
    ) -> Result<(), EngineError> {
        if let Some(p) = patch.price_per_night {
            validate_price(p)?;
        }
        if patch.max_guests == Some(0) {
            return Err(EngineError::LimitExceeded("max_guests"));
        }
        let ps = self
            .get_property(&property_id)
            .ok_or(EngineError::NotFound(property_id))?;
        let mut guard = ps.write().await;
        if guard.host != actor {
            return Err(EngineError::NotOwner(actor));
        }
        let available_from = patch.available_from.unwrap_or(guard.available_from);
        let available_to = patch.available_to.unwrap_or(guard.available_to);
        validate_window(available_from, available_to)?;
        let event = Event::PropertyUpdated {
            id: property_id,
            price_per_night: patch.price_per_night.unwrap_or(guard.price_per_night),
            max_guests: patch.max_guests.unwrap_or(guard.max_guests),
            available_from,
            available_to,
            is_available: patch.is_available.unwrap_or(guard.is_available),
        };
        self.persist_and_apply(property_id, &mut guard, &event).await
    }

    /// Remove a listing entirely. Existing bookings go with it; the WAL keeps
    /// the history but replay drops the property at the delist event.
    pub async fn delist_property(&self, property_id: Ulid, actor: Ulid) -> Result<(), EngineError> {
        let ps = self
            .get_property(&property_id)
            .ok_or(EngineError::NotFound(property_id))?;
        let guard = ps.write().await;
        if guard.host != actor {
            return Err(EngineError::NotOwner(actor));
        }
        let event = Event::PropertyDelisted { id: property_id };
        self.wal_append(&event).await?;
        self.drop_property_indexes(&guard);
        drop(guard);
        self.state.remove(&property_id);
        self.notify.send_event(property_id, &event);
        Ok(())
    }

    pub async fn block_dates(
        &self,
        property_id: Ulid,
        actor: Ulid,
        dates: Vec<NaiveDate>,
    ) -> Result<(), EngineError> {
        if dates.is_empty() {
            return Ok(());
        }
        let ps = self
            .get_property(&property_id)
            .ok_or(EngineError::NotFound(property_id))?;
        let mut guard = ps.write().await;
        if guard.host != actor {
            return Err(EngineError::NotOwner(actor));
        }
        let event = Event::DatesBlocked { property_id, dates };
        self.persist_and_apply(property_id, &mut guard, &event).await
    }

    pub async fn unblock_dates(
        &self,
        property_id: Ulid,
        actor: Ulid,
        dates: Vec<NaiveDate>,
    ) -> Result<(), EngineError> {
        if dates.is_empty() {
            return Ok(());
        }
        let ps = self
            .get_property(&property_id)
            .ok_or(EngineError::NotFound(property_id))?;
        let mut guard = ps.write().await;
        if guard.host != actor {
            return Err(EngineError::NotOwner(actor));
        }
        let event = Event::DatesUnblocked { property_id, dates };
        self.persist_and_apply(property_id, &mut guard, &event).await
    }

    /// Book a stay. Card bookings open a checkout session and stay `Pending`
    /// until the session is confirmed paid; transfer bookings also start
    /// `Pending` and are confirmed out of band. Either way the dates are held
    /// from the moment this returns.
    pub async fn create_booking(
        &self,
        property_id: Ulid,
        guest: Ulid,
        range: DateRange,
        payment_method: PaymentMethod,
    ) -> Result<(Ulid, Option<CheckoutSession>), EngineError> {
        validate_range(&range)?;
        let ps = self
            .get_property(&property_id)
            .ok_or(EngineError::NotFound(property_id))?;
        let mut guard = ps.write().await;

        let verdict = check_availability(&guard, &range);
        if let Some(reason) = verdict.reason {
            metrics::counter!(crate::observability::BOOKINGS_REJECTED_TOTAL).increment(1);
            return Err(EngineError::Unavailable(reason));
        }
        if guard.bookings.len() >= limits::MAX_BOOKINGS_PER_PROPERTY {
            return Err(EngineError::LimitExceeded("bookings per property"));
        }

        let total_price = guard.price_per_night * Decimal::from(range.nights());
        let booking_id = Ulid::new();

        let session = match payment_method {
            PaymentMethod::Card => {
                // Nightly prices are validated to two decimal places, so the
                // minor-unit amount is exact.
                let amount_minor = (total_price * Decimal::from(100))
                    .to_i64()
                    .ok_or_else(|| {
                        EngineError::InvalidPrice(format!("total {total_price} out of range"))
                    })?;
                let s = self
                    .gateway
                    .create_session(booking_id, amount_minor)
                    .await
                    .map_err(|e| EngineError::PaymentInitFailed(e.to_string()))?;
                Some(s)
            }
            PaymentMethod::Transfer => None,
        };

        let event = Event::BookingCreated {
            id: booking_id,
            property_id,
            guest,
            range,
            total_price,
            payment_method,
            session_ref: session.as_ref().map(|s| s.session_id.clone()),
            created_at: now_ms(),
        };
        self.persist_and_apply(property_id, &mut guard, &event).await?;

        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        debug!(%booking_id, %property_id, %guest, nights = range.nights(), "booking created");
        Ok((booking_id, session))
    }

    /// Mark a card booking paid once its checkout session completes.
    /// Idempotent: confirming an already-paid booking is a no-op that
    /// returns the booking id again.
    pub async fn confirm_payment(&self, session_ref: &str) -> Result<Ulid, EngineError> {
        let booking_id = self
            .session_to_booking
            .get(session_ref)
            .map(|e| *e.value())
            .ok_or_else(|| EngineError::UnknownSession(session_ref.to_string()))?;
        let (property_id, mut guard) = self.resolve_booking_write(&booking_id).await?;

        let booking = guard
            .booking(booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        if booking.is_paid {
            return Ok(booking_id);
        }
        let guest = booking.guest;

        match self.gateway.retrieve_session(session_ref).await {
            Ok(SessionStatus::Paid) => {}
            Ok(status) => {
                return Err(EngineError::PaymentIncomplete(format!(
                    "session {session_ref} is {status:?}"
                )));
            }
            Err(e) => return Err(EngineError::PaymentIncomplete(e.to_string())),
        }

        let event = Event::PaymentConfirmed {
            booking_id,
            property_id,
        };
        self.persist_and_apply(property_id, &mut guard, &event).await?;
        self.notify.send_event(guest, &event);

        if let Err(e) = self.notifier.notify_guest(guest, "payment received, booking confirmed") {
            warn!(%guest, error = %e, "guest notification failed");
        }
        metrics::counter!(crate::observability::PAYMENTS_CONFIRMED_TOTAL).increment(1);
        Ok(booking_id)
    }

    /// Cancel a booking and promote the next waitlisted guest while still
    /// holding the property lock, so nobody can race in between the dates
    /// freeing up and the promotion.
    pub async fn cancel_booking(&self, booking_id: Ulid, actor: Ulid) -> Result<(), EngineError> {
        let (property_id, mut guard) = self.resolve_booking_write(&booking_id).await?;

        let booking = guard
            .booking(booking_id)
            .ok_or(EngineError::NotFound(booking_id))?;
        if booking.guest != actor && guard.host != actor {
            return Err(EngineError::NotOwner(actor));
        }
        if booking.status == BookingStatus::Canceled {
            return Ok(());
        }
        let freed_dates = booking.blocks_dates();

        let event = Event::BookingCanceled {
            booking_id,
            property_id,
        };
        self.persist_and_apply(property_id, &mut guard, &event).await?;
        metrics::counter!(crate::observability::BOOKINGS_CANCELED_TOTAL).increment(1);

        // Only a date-holding booking frees anything worth promoting for.
        if freed_dates {
            self.promote_next(property_id, &mut guard, now_ms()).await?;
        }
        Ok(())
    }
}
