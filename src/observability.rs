use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "hearth_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "hearth_query_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "hearth_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "hearth_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "hearth_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "hearth_tenants_active";

/// Counter: startup/auth failures.
pub const AUTH_FAILURES_TOTAL: &str = "hearth_auth_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "hearth_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "hearth_wal_flush_batch_size";

// ── Domain metrics ──────────────────────────────────────────────

pub const PROPERTIES_LISTED_TOTAL: &str = "hearth_properties_listed_total";
pub const BOOKINGS_CREATED_TOTAL: &str = "hearth_bookings_created_total";
pub const BOOKINGS_REJECTED_TOTAL: &str = "hearth_bookings_rejected_total";
pub const BOOKINGS_CANCELED_TOTAL: &str = "hearth_bookings_canceled_total";
pub const PAYMENTS_CONFIRMED_TOTAL: &str = "hearth_payments_confirmed_total";
pub const WAITLIST_JOINED_TOTAL: &str = "hearth_waitlist_joined_total";
pub const WAITLIST_PROMOTED_TOTAL: &str = "hearth_waitlist_promoted_total";
pub const WAITLIST_CONFIRMED_TOTAL: &str = "hearth_waitlist_confirmed_total";
pub const WAITLIST_EXPIRED_TOTAL: &str = "hearth_waitlist_expired_total";
pub const MESSAGES_SENT_TOTAL: &str = "hearth_messages_sent_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertProperty { .. } => "insert_property",
        Command::UpdateProperty { .. } => "update_property",
        Command::DeleteProperty { .. } => "delete_property",
        Command::InsertBlockedDates { .. } => "insert_blocked_dates",
        Command::DeleteBlockedDates { .. } => "delete_blocked_dates",
        Command::InsertBooking { .. } => "insert_booking",
        Command::ConfirmPayment { .. } => "confirm_payment",
        Command::CancelBooking { .. } => "cancel_booking",
        Command::InsertWaitlist { .. } => "insert_waitlist",
        Command::ConfirmWaitlist { .. } => "confirm_waitlist",
        Command::WithdrawWaitlist { .. } => "withdraw_waitlist",
        Command::InsertConversation { .. } => "insert_conversation",
        Command::InsertMessage { .. } => "insert_message",
        Command::SelectProperties { .. } => "select_properties",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectBookings { .. } => "select_bookings",
        Command::SelectWaitlist { .. } => "select_waitlist",
        Command::SelectMessages { .. } => "select_messages",
        Command::Listen { .. } => "listen",
        Command::Unlisten { .. } => "unlisten",
        Command::UnlistenAll => "unlisten_all",
    }
}
