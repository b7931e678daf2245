use ulid::Ulid;

use super::availability::UnavailableReason;

#[derive(Debug, PartialEq, Eq)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// The availability check failed; carries the specific reason.
    Unavailable(UnavailableReason),
    InvalidRange,
    InvalidPrice(String),
    /// Actor is neither the booking's guest nor the property's host.
    NotOwner(Ulid),
    NotParticipant(Ulid),
    AlreadyEnqueued(Ulid),
    AlreadyConfirmed(Ulid),
    /// Waitlist entry's holding deadline has passed.
    Expired(Ulid),
    /// Entry exists but has not been offered a slot yet.
    NotNotified(Ulid),
    /// No booking is associated with this checkout-session reference.
    UnknownSession(String),
    PaymentInitFailed(String),
    PaymentIncomplete(String),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Unavailable(reason) => write!(f, "unavailable: {reason}"),
            EngineError::InvalidRange => write!(f, "check-out must be after check-in"),
            EngineError::InvalidPrice(msg) => write!(f, "invalid price: {msg}"),
            EngineError::NotOwner(actor) => write!(f, "not permitted for actor: {actor}"),
            EngineError::NotParticipant(actor) => {
                write!(f, "not a conversation participant: {actor}")
            }
            EngineError::AlreadyEnqueued(id) => {
                write!(f, "already on the waitlist (entry {id})")
            }
            EngineError::AlreadyConfirmed(id) => write!(f, "already confirmed: {id}"),
            EngineError::Expired(id) => write!(f, "holding deadline passed for entry: {id}"),
            EngineError::NotNotified(id) => {
                write!(f, "entry {id} has not been offered a slot yet")
            }
            EngineError::UnknownSession(s) => write!(f, "unknown checkout session: {s}"),
            EngineError::PaymentInitFailed(e) => {
                write!(f, "payment session creation failed: {e}")
            }
            EngineError::PaymentIncomplete(s) => {
                write!(f, "checkout session not paid: {s}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
