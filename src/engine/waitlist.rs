//! Waitlist state machine.
//!
//! Entries move Enqueued → Notified → Confirmed, or out via Expired and
//! Withdrawn. Promotion is strictly FIFO on enqueue time. A promoted guest
//! holds the spot until a hard deadline; confirming after the deadline
//! expires the entry on the spot and cascades the promotion to the next
//! guest in line.

use tracing::{debug, warn};
use ulid::Ulid;

use crate::engine::error::EngineError;
use crate::engine::validate::now_ms;
use crate::engine::Engine;
use crate::limits;
use crate::model::*;

impl Engine {
    pub async fn join_waitlist(&self, property_id: Ulid, guest: Ulid) -> Result<Ulid, EngineError> {
        let ps = self
            .get_property(&property_id)
            .ok_or(EngineError::NotFound(property_id))?;
        let mut guard = ps.write().await;

        if let Some(existing) = guard.active_entry_for(guest) {
            return Err(EngineError::AlreadyEnqueued(existing.id));
        }
        if guard
            .waitlist
            .iter()
            .filter(|e| e.is_active())
            .count()
            >= limits::MAX_WAITLIST_PER_PROPERTY
        {
            return Err(EngineError::LimitExceeded("waitlist per property"));
        }

        let entry_id = Ulid::new();
        let event = Event::WaitlistJoined {
            id: entry_id,
            property_id,
            guest,
            created_at: now_ms(),
        };
        self.persist_and_apply(property_id, &mut guard, &event).await?;

        metrics::counter!(crate::observability::WAITLIST_JOINED_TOTAL).increment(1);
        debug!(%entry_id, %property_id, %guest, "joined waitlist");
        Ok(entry_id)
    }

    /// Promote the oldest enqueued entry, if any. Caller holds the property
    /// write lock, so the promotion is atomic with whatever freed the spot.
    pub(super) async fn promote_next(
        &self,
        property_id: Ulid,
        ps: &mut PropertyState,
        now: Ms,
    ) -> Result<(), EngineError> {
        let Some(next) = ps.next_in_line() else {
            return Ok(());
        };
        let entry_id = next.id;
        let guest = next.guest;

        let event = Event::WaitlistNotified {
            entry_id,
            property_id,
            notified_at: now,
            deadline: now + self.hold_window_ms,
        };
        self.persist_and_apply(property_id, ps, &event).await?;
        self.notify.send_event(guest, &event);

        if let Err(e) = self
            .notifier
            .notify_guest(guest, "a spot opened up, confirm before your hold expires")
        {
            warn!(%guest, error = %e, "guest notification failed");
        }
        metrics::counter!(crate::observability::WAITLIST_PROMOTED_TOTAL).increment(1);
        debug!(%entry_id, %property_id, %guest, "waitlist entry promoted");
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn promote_for_test(&self, property_id: Ulid, ps: &mut PropertyState, now: Ms) {
        self.promote_next(property_id, ps, now).await.unwrap();
    }

    /// Guest accepts a promoted spot. Fails if the hold deadline has passed;
    /// a late confirm expires the entry immediately and hands the spot to
    /// the next guest in line.
    pub async fn confirm_waitlist(&self, entry_id: Ulid, actor: Ulid) -> Result<(), EngineError> {
        let now = now_ms();
        let (property_id, mut guard) = self.resolve_entry_write(&entry_id).await?;

        let entry = guard
            .entry(entry_id)
            .ok_or(EngineError::NotFound(entry_id))?;
        if entry.guest != actor {
            return Err(EngineError::NotOwner(actor));
        }
        match entry.status {
            WaitlistStatus::Confirmed => return Err(EngineError::AlreadyConfirmed(entry_id)),
            WaitlistStatus::Expired => return Err(EngineError::Expired(entry_id)),
            WaitlistStatus::Enqueued | WaitlistStatus::Withdrawn => {
                return Err(EngineError::NotNotified(entry_id));
            }
            WaitlistStatus::Notified => {}
        }

        let deadline = entry.deadline.unwrap_or(Ms::MAX);
        if now > deadline {
            // Hold lapsed before the guest acted. Expire in place and cascade
            // to the next guest; the caller learns the spot is gone.
            let event = Event::WaitlistExpired {
                entry_id,
                property_id,
            };
            self.persist_and_apply(property_id, &mut guard, &event).await?;
            metrics::counter!(crate::observability::WAITLIST_EXPIRED_TOTAL).increment(1);
            self.promote_next(property_id, &mut guard, now).await?;
            return Err(EngineError::Expired(entry_id));
        }

        let event = Event::WaitlistConfirmed {
            entry_id,
            property_id,
        };
        self.persist_and_apply(property_id, &mut guard, &event).await?;
        metrics::counter!(crate::observability::WAITLIST_CONFIRMED_TOTAL).increment(1);
        debug!(%entry_id, %property_id, "waitlist entry confirmed");
        Ok(())
    }

    /// Guest leaves the waitlist. Withdrawing a promoted entry passes the
    /// hold straight to the next guest in line.
    pub async fn withdraw_waitlist(&self, entry_id: Ulid, actor: Ulid) -> Result<(), EngineError> {
        let (property_id, mut guard) = self.resolve_entry_write(&entry_id).await?;

        let entry = guard
            .entry(entry_id)
            .ok_or(EngineError::NotFound(entry_id))?;
        if entry.guest != actor {
            return Err(EngineError::NotOwner(actor));
        }
        if !entry.is_active() {
            return Ok(());
        }
        let was_notified = entry.status == WaitlistStatus::Notified;

        let event = Event::WaitlistWithdrawn {
            entry_id,
            property_id,
        };
        self.persist_and_apply(property_id, &mut guard, &event).await?;

        if was_notified {
            self.promote_next(property_id, &mut guard, now_ms()).await?;
        }
        Ok(())
    }

    /// Reaper sweep: expire every promoted entry whose deadline has passed,
    /// cascading promotions as spots free up. Returns how many expired.
    pub async fn expire_stale(&self, now: Ms) -> usize {
        let property_ids: Vec<Ulid> = self.state.iter().map(|e| *e.key()).collect();
        let mut expired = 0;

        for property_id in property_ids {
            let Some(ps) = self.get_property(&property_id) else { continue };
            let mut guard = ps.write().await;

            loop {
                let Some(stale) = guard
                    .waitlist
                    .iter()
                    .find(|e| {
                        e.status == WaitlistStatus::Notified
                            && e.deadline.is_some_and(|d| now > d)
                    })
                    .map(|e| e.id)
                else {
                    break;
                };

                let event = Event::WaitlistExpired {
                    entry_id: stale,
                    property_id,
                };
                if let Err(e) = self.persist_and_apply(property_id, &mut guard, &event).await {
                    warn!(%property_id, error = %e, "failed to expire waitlist entry");
                    break;
                }
                expired += 1;
                metrics::counter!(crate::observability::WAITLIST_EXPIRED_TOTAL).increment(1);

                // Cascade: the freed hold goes to the next guest, who may in
                // turn already be past deadline on the next sweep.
                if let Err(e) = self.promote_next(property_id, &mut guard, now).await {
                    warn!(%property_id, error = %e, "promotion after expiry failed");
                    break;
                }
            }
        }
        expired
    }
}
