//! Checkout-session gateway seam.
//!
//! Card bookings open a hosted checkout session with an external processor;
//! the booking stays `Pending` until the session is confirmed paid. The
//! engine only ever sees opaque session handles, never card data.

use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Opaque handle stored on the booking as `session_ref`.
    pub session_id: String,
    /// Where to send the guest to complete payment.
    pub redirect_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Paid,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The processor rejected the session request.
    Rejected(String),
    /// No session with that handle.
    UnknownSession(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Rejected(msg) => write!(f, "checkout session rejected: {msg}"),
            GatewayError::UnknownSession(s) => write!(f, "unknown checkout session {s}"),
        }
    }
}

impl std::error::Error for GatewayError {}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session for `amount_minor` minor units
    /// (e.g. centimes) in the platform currency.
    async fn create_session(
        &self,
        booking_id: Ulid,
        amount_minor: i64,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Current status of a previously created session.
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, GatewayError>;
}

/// In-process stand-in for a hosted processor. Sessions it issues are
/// considered paid once the processor's success callback relays them back,
/// which in this deployment means any session it knows about.
pub struct HostedGateway {
    sessions: DashMap<String, i64>,
}

impl HostedGateway {
    pub fn new() -> Self {
        Self { sessions: DashMap::new() }
    }
}

impl Default for HostedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for HostedGateway {
    async fn create_session(
        &self,
        booking_id: Ulid,
        amount_minor: i64,
    ) -> Result<CheckoutSession, GatewayError> {
        if amount_minor <= 0 {
            return Err(GatewayError::Rejected(format!(
                "non-positive amount {amount_minor}"
            )));
        }
        let session_id = format!("cs_{}", Ulid::new());
        self.sessions.insert(session_id.clone(), amount_minor);
        Ok(CheckoutSession {
            redirect_url: format!("/checkout/{session_id}?booking={booking_id}"),
            session_id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        if self.sessions.contains_key(session_id) {
            Ok(SessionStatus::Paid)
        } else {
            Err(GatewayError::UnknownSession(session_id.to_string()))
        }
    }
}

/// Scriptable gateway for tests: session outcomes are set up front.
pub struct MockGateway {
    pub sessions: DashMap<String, SessionStatus>,
    counter: std::sync::atomic::AtomicU64,
    /// When set, `create_session` fails with this message.
    pub fail_create: Option<String>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            counter: std::sync::atomic::AtomicU64::new(0),
            fail_create: None,
        }
    }

    pub fn failing(msg: &str) -> Self {
        Self {
            sessions: DashMap::new(),
            counter: std::sync::atomic::AtomicU64::new(0),
            fail_create: Some(msg.to_string()),
        }
    }

    pub fn set_status(&self, session_id: &str, status: SessionStatus) {
        self.sessions.insert(session_id.to_string(), status);
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(
        &self,
        _booking_id: Ulid,
        amount_minor: i64,
    ) -> Result<CheckoutSession, GatewayError> {
        if let Some(msg) = &self.fail_create {
            return Err(GatewayError::Rejected(msg.clone()));
        }
        if amount_minor <= 0 {
            return Err(GatewayError::Rejected(format!(
                "non-positive amount {amount_minor}"
            )));
        }
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let session_id = format!("mock_{n}");
        self.sessions.insert(session_id.clone(), SessionStatus::Paid);
        Ok(CheckoutSession {
            redirect_url: format!("/mock/{session_id}"),
            session_id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        self.sessions
            .get(session_id)
            .map(|s| *s.value())
            .ok_or_else(|| GatewayError::UnknownSession(session_id.to_string()))
    }
}
