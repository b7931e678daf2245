mod availability;
mod chat;
mod error;
mod ledger;
mod queries;
mod validate;
mod waitlist;

pub use availability::{check_availability, AvailabilityResult, UnavailableReason};
pub use error::EngineError;
pub use ledger::PropertyPatch;
pub use queries::PropertyFilter;
pub use validate::now_ms;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::notify::{Notifier, NotifyHub};
use crate::payment::PaymentGateway;
use crate::wal::Wal;

pub type SharedPropertyState = Arc<RwLock<PropertyState>>;
pub type SharedConversation = Arc<RwLock<Conversation>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                                .record(batch.len() as f64);
                            let flush_start = std::time::Instant::now();
                            let result = flush_batch(&mut wal, &mut batch);
                            metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                                .record(flush_start.elapsed().as_secs_f64());
                            respond_batch(&mut batch, &result);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                        .record(batch.len() as f64);
                    let flush_start = std::time::Instant::now();
                    let result = flush_batch(&mut wal, &mut batch);
                    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                        .record(flush_start.elapsed().as_secs_f64());
                    respond_batch(&mut batch, &result);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &mut [(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

pub struct Engine {
    pub state: DashMap<Ulid, SharedPropertyState>,
    pub conversations: DashMap<Ulid, SharedConversation>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) gateway: Arc<dyn PaymentGateway>,
    pub(super) notifier: Arc<dyn Notifier>,
    /// How long a promoted waitlist guest has to confirm.
    pub(super) hold_window_ms: Ms,
    /// Reverse lookup: booking id → property id.
    pub(super) booking_to_property: DashMap<Ulid, Ulid>,
    /// Reverse lookup: waitlist entry id → property id.
    pub(super) entry_to_property: DashMap<Ulid, Ulid>,
    /// Checkout-session handle → booking id, for payment confirmation.
    pub(super) session_to_booking: DashMap<String, Ulid>,
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        hold_window_ms: Ms,
    ) -> std::io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            state: DashMap::new(),
            conversations: DashMap::new(),
            wal_tx,
            notify,
            gateway,
            notifier,
            hold_window_ms,
            booking_to_property: DashMap::new(),
            entry_to_property: DashMap::new(),
            session_to_booking: DashMap::new(),
        };

        // Replay events — we're the sole owner of these Arcs, so try_read/try_write
        // always succeed instantly (no contention). Never use blocking_read/blocking_write
        // here because this may run inside an async context (e.g. lazy tenant creation).
        for event in &events {
            match event {
                Event::PropertyListed {
                    id,
                    host,
                    title,
                    price_per_night,
                    max_guests,
                    category,
                    available_from,
                    available_to,
                } => {
                    let ps = PropertyState::new(
                        *id,
                        *host,
                        title.clone(),
                        *price_per_night,
                        *max_guests,
                        category.clone(),
                        *available_from,
                        *available_to,
                    );
                    engine.state.insert(*id, Arc::new(RwLock::new(ps)));
                }
                Event::PropertyDelisted { id } => {
                    if let Some((_, ps)) = engine.state.remove(id) {
                        let guard = ps.try_read().expect("replay: uncontended read");
                        engine.drop_property_indexes(&guard);
                    }
                }
                Event::ConversationOpened {
                    id,
                    property_id,
                    participants,
                    created_at,
                } => {
                    let convo = Conversation {
                        id: *id,
                        property_id: *property_id,
                        participants: *participants,
                        created_at: *created_at,
                        messages: Vec::new(),
                    };
                    engine.conversations.insert(*id, Arc::new(RwLock::new(convo)));
                }
                Event::MessageSent {
                    id,
                    conversation_id,
                    sender,
                    content,
                    created_at,
                } => {
                    if let Some(entry) = engine.conversations.get(conversation_id) {
                        let convo = entry.value().clone();
                        let mut guard =
                            convo.try_write().expect("replay: uncontended write");
                        guard.messages.push(Message {
                            id: *id,
                            sender: *sender,
                            content: content.clone(),
                            created_at: *created_at,
                        });
                    }
                }
                other => {
                    if let Some(property_id) = event_property_id(other)
                        && let Some(entry) = engine.state.get(&property_id)
                    {
                        let ps = entry.value().clone();
                        let mut guard = ps.try_write().expect("replay: uncontended write");
                        engine.apply_property_event(&mut guard, other);
                    }
                }
            }
        }

        Ok(engine)
    }

    /// Apply a property-scoped event to its state (caller holds the write lock).
    pub(super) fn apply_property_event(&self, ps: &mut PropertyState, event: &Event) {
        match event {
            Event::PropertyUpdated {
                price_per_night,
                max_guests,
                available_from,
                available_to,
                is_available,
                ..
            } => {
                ps.price_per_night = *price_per_night;
                ps.max_guests = *max_guests;
                ps.available_from = *available_from;
                ps.available_to = *available_to;
                ps.is_available = *is_available;
            }
            Event::DatesBlocked { dates, .. } => {
                ps.blocked_dates.extend(dates.iter().copied());
            }
            Event::DatesUnblocked { dates, .. } => {
                for d in dates {
                    ps.blocked_dates.remove(d);
                }
            }
            Event::BookingCreated {
                id,
                property_id,
                guest,
                range,
                total_price,
                payment_method,
                session_ref,
                created_at,
            } => {
                ps.insert_booking(Booking {
                    id: *id,
                    guest: *guest,
                    range: *range,
                    total_price: *total_price,
                    status: BookingStatus::Pending,
                    is_paid: false,
                    payment_method: *payment_method,
                    session_ref: session_ref.clone(),
                    created_at: *created_at,
                });
                self.booking_to_property.insert(*id, *property_id);
                if let Some(s) = session_ref {
                    self.session_to_booking.insert(s.clone(), *id);
                }
            }
            Event::PaymentConfirmed { booking_id, .. } => {
                if let Some(b) = ps.booking_mut(*booking_id) {
                    b.is_paid = true;
                    b.status = BookingStatus::Confirmed;
                }
            }
            Event::BookingCanceled { booking_id, .. } => {
                if let Some(b) = ps.booking_mut(*booking_id) {
                    b.status = BookingStatus::Canceled;
                }
            }
            Event::WaitlistJoined {
                id,
                property_id,
                guest,
                created_at,
            } => {
                ps.waitlist.push(WaitListEntry {
                    id: *id,
                    guest: *guest,
                    created_at: *created_at,
                    notified_at: None,
                    deadline: None,
                    status: WaitlistStatus::Enqueued,
                });
                self.entry_to_property.insert(*id, *property_id);
            }
            Event::WaitlistNotified {
                entry_id,
                notified_at,
                deadline,
                ..
            } => {
                if let Some(e) = ps.entry_mut(*entry_id) {
                    e.notified_at = Some(*notified_at);
                    e.deadline = Some(*deadline);
                    e.status = WaitlistStatus::Notified;
                }
            }
            Event::WaitlistConfirmed { entry_id, .. } => {
                if let Some(e) = ps.entry_mut(*entry_id) {
                    e.status = WaitlistStatus::Confirmed;
                }
            }
            Event::WaitlistExpired { entry_id, .. } => {
                if let Some(e) = ps.entry_mut(*entry_id) {
                    e.status = WaitlistStatus::Expired;
                }
            }
            Event::WaitlistWithdrawn { entry_id, .. } => {
                if let Some(e) = ps.entry_mut(*entry_id) {
                    e.status = WaitlistStatus::Withdrawn;
                }
            }
            // Listed/Delisted and conversation events are handled at the map level
            Event::PropertyListed { .. }
            | Event::PropertyDelisted { .. }
            | Event::ConversationOpened { .. }
            | Event::MessageSent { .. } => {}
        }
    }

    /// Drop reverse-lookup entries for everything attached to a property.
    pub(super) fn drop_property_indexes(&self, ps: &PropertyState) {
        for b in &ps.bookings {
            self.booking_to_property.remove(&b.id);
            if let Some(s) = &b.session_ref {
                self.session_to_booking.remove(s);
            }
        }
        for e in &ps.waitlist {
            self.entry_to_property.remove(&e.id);
        }
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_property(&self, id: &Ulid) -> Option<SharedPropertyState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    pub fn property_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_property.get(booking_id).map(|e| *e.value())
    }

    pub fn property_for_entry(&self, entry_id: &Ulid) -> Option<Ulid> {
        self.entry_to_property.get(entry_id).map(|e| *e.value())
    }

    /// WAL-append + apply + broadcast in one call.
    pub(super) async fn persist_and_apply(
        &self,
        property_id: Ulid,
        ps: &mut PropertyState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.apply_property_event(ps, event);
        self.notify.send_event(property_id, event);
        Ok(())
    }

    /// Lookup booking → property, get property, acquire write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<PropertyState>), EngineError> {
        let property_id = self
            .property_for_booking(booking_id)
            .ok_or(EngineError::NotFound(*booking_id))?;
        let ps = self
            .get_property(&property_id)
            .ok_or(EngineError::NotFound(property_id))?;
        let guard = ps.write_owned().await;
        Ok((property_id, guard))
    }

    /// Lookup waitlist entry → property, get property, acquire write lock.
    pub(super) async fn resolve_entry_write(
        &self,
        entry_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<PropertyState>), EngineError> {
        let property_id = self
            .property_for_entry(entry_id)
            .ok_or(EngineError::NotFound(*entry_id))?;
        let ps = self
            .get_property(&property_id)
            .ok_or(EngineError::NotFound(property_id))?;
        let guard = ps.write_owned().await;
        Ok((property_id, guard))
    }

    /// Compact the WAL by rewriting it with only the events needed to recreate
    /// the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        let property_ids: Vec<Ulid> = self.state.iter().map(|e| *e.key()).collect();
        for id in property_ids {
            let Some(entry) = self.state.get(&id) else { continue };
            let ps = entry.value().clone();
            drop(entry);
            let guard = ps.read().await;

            events.push(Event::PropertyListed {
                id: guard.id,
                host: guard.host,
                title: guard.title.clone(),
                price_per_night: guard.price_per_night,
                max_guests: guard.max_guests,
                category: guard.category.clone(),
                available_from: guard.available_from,
                available_to: guard.available_to,
            });
            if !guard.is_available {
                events.push(Event::PropertyUpdated {
                    id: guard.id,
                    price_per_night: guard.price_per_night,
                    max_guests: guard.max_guests,
                    available_from: guard.available_from,
                    available_to: guard.available_to,
                    is_available: false,
                });
            }
            if !guard.blocked_dates.is_empty() {
                events.push(Event::DatesBlocked {
                    property_id: guard.id,
                    dates: guard.blocked_dates.iter().copied().collect(),
                });
            }
            for b in &guard.bookings {
                events.push(Event::BookingCreated {
                    id: b.id,
                    property_id: guard.id,
                    guest: b.guest,
                    range: b.range,
                    total_price: b.total_price,
                    payment_method: b.payment_method,
                    session_ref: b.session_ref.clone(),
                    created_at: b.created_at,
                });
                match b.status {
                    BookingStatus::Confirmed => events.push(Event::PaymentConfirmed {
                        booking_id: b.id,
                        property_id: guard.id,
                    }),
                    BookingStatus::Canceled => events.push(Event::BookingCanceled {
                        booking_id: b.id,
                        property_id: guard.id,
                    }),
                    BookingStatus::Pending => {}
                }
            }
            for e in &guard.waitlist {
                events.push(Event::WaitlistJoined {
                    id: e.id,
                    property_id: guard.id,
                    guest: e.guest,
                    created_at: e.created_at,
                });
                if let (Some(notified_at), Some(deadline)) = (e.notified_at, e.deadline) {
                    events.push(Event::WaitlistNotified {
                        entry_id: e.id,
                        property_id: guard.id,
                        notified_at,
                        deadline,
                    });
                }
                match e.status {
                    WaitlistStatus::Confirmed => events.push(Event::WaitlistConfirmed {
                        entry_id: e.id,
                        property_id: guard.id,
                    }),
                    WaitlistStatus::Expired => events.push(Event::WaitlistExpired {
                        entry_id: e.id,
                        property_id: guard.id,
                    }),
                    WaitlistStatus::Withdrawn => events.push(Event::WaitlistWithdrawn {
                        entry_id: e.id,
                        property_id: guard.id,
                    }),
                    WaitlistStatus::Enqueued | WaitlistStatus::Notified => {}
                }
            }
        }

        let convo_ids: Vec<Ulid> = self.conversations.iter().map(|e| *e.key()).collect();
        for id in convo_ids {
            let Some(entry) = self.conversations.get(&id) else { continue };
            let convo = entry.value().clone();
            drop(entry);
            let guard = convo.read().await;
            events.push(Event::ConversationOpened {
                id: guard.id,
                property_id: guard.property_id,
                participants: guard.participants,
                created_at: guard.created_at,
            });
            for m in &guard.messages {
                events.push(Event::MessageSent {
                    id: m.id,
                    conversation_id: guard.id,
                    sender: m.sender,
                    content: m.content.clone(),
                    created_at: m.created_at,
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// Extract the property id from an event (for property-scoped events).
fn event_property_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::DatesBlocked { property_id, .. }
        | Event::DatesUnblocked { property_id, .. }
        | Event::BookingCreated { property_id, .. }
        | Event::PaymentConfirmed { property_id, .. }
        | Event::BookingCanceled { property_id, .. }
        | Event::WaitlistJoined { property_id, .. }
        | Event::WaitlistNotified { property_id, .. }
        | Event::WaitlistConfirmed { property_id, .. }
        | Event::WaitlistExpired { property_id, .. }
        | Event::WaitlistWithdrawn { property_id, .. } => Some(*property_id),
        Event::PropertyUpdated { id, .. } => Some(*id),
        Event::PropertyListed { .. }
        | Event::PropertyDelisted { .. }
        | Event::ConversationOpened { .. }
        | Event::MessageSent { .. } => None,
    }
}
