//! In-memory property rental engine speaking the Postgres wire protocol.
//!
//! Listings, bookings, waitlists and guest-host chat live in per-tenant
//! engines keyed by the connection's database name. Mutations are durably
//! logged to a write-ahead log before they apply; LISTEN/NOTIFY carries
//! booking and waitlist events to connected clients.

pub mod auth;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod payment;
pub mod reaper;
pub mod sql;
pub mod tenant;
pub mod tls;
pub mod wal;
pub mod wire;
