use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_postgres::{AsyncMessage, Config, NoTls, Notification, SimpleQueryMessage};
use ulid::Ulid;

use hearth::payment::HostedGateway;
use hearth::tenant::TenantManager;
use hearth::wire;

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server() -> (SocketAddr, Arc<TenantManager>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("hearth_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let tm = Arc::new(TenantManager::new(
        dir,
        1000,
        Arc::new(HostedGateway::new()),
        86_400_000,
    ));

    let tm2 = tm.clone();
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let tm = tm2.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, tm, "hearth".to_string(), None).await;
            });
        }
    });

    (addr, tm)
}

async fn connect(
    addr: SocketAddr,
) -> (
    tokio_postgres::Client,
    mpsc::UnboundedReceiver<Notification>,
) {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname("test")
        .user("hearth")
        .password("hearth");

    let (client, mut connection) = config.connect(NoTls).await.unwrap();

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let stream = stream::poll_fn(move |cx| connection.poll_message(cx));
        futures::pin_mut!(stream);
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(AsyncMessage::Notification(n)) => {
                    let _ = tx.send(n);
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    (client, rx)
}

/// Insert a property and return its id.
async fn insert_property(client: &tokio_postgres::Client, host: Ulid) -> String {
    let rows = client
        .simple_query(&format!(
            "INSERT INTO properties (host, title, price_per_night, max_guests) \
             VALUES ('{host}', 'Seaside flat', 100.00, 4)"
        ))
        .await
        .unwrap();
    for row in rows {
        if let SimpleQueryMessage::Row(r) = row {
            return r.get("id").unwrap().to_string();
        }
    }
    panic!("INSERT did not return the new id");
}

async fn insert_booking(client: &tokio_postgres::Client, pid: &str, guest: Ulid, ci: &str, co: &str) {
    client
        .batch_execute(&format!(
            "INSERT INTO bookings (property_id, guest, check_in, check_out, payment_method) \
             VALUES ('{pid}', '{guest}', '{ci}', '{co}', 'transfer')"
        ))
        .await
        .unwrap();
}

/// Buffered notifications are written out at the start of the next query on
/// the subscribed connection, so nudge the server with a cheap SELECT.
async fn flush(client: &tokio_postgres::Client) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    client
        .simple_query("SELECT * FROM properties")
        .await
        .unwrap();
}

/// Wait for a notification with timeout.
async fn recv_notification(
    rx: &mut mpsc::UnboundedReceiver<Notification>,
    timeout: Duration,
) -> Option<Notification> {
    tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn connect_and_query() {
    let (addr, _tm) = start_test_server().await;
    let (client, _rx) = connect(addr).await;

    let pid = insert_property(&client, Ulid::new()).await;
    Ulid::from_string(&pid).expect("returned id is a ULID");

    let rows = client
        .simple_query("SELECT * FROM properties")
        .await
        .unwrap();

    // At least one data row plus command complete
    assert!(rows.len() > 1);
}

#[tokio::test]
async fn listen_receives_booking_notification() {
    let (addr, _tm) = start_test_server().await;

    // Connection 1: subscriber
    let (client1, mut rx1) = connect(addr).await;
    let pid = insert_property(&client1, Ulid::new()).await;

    client1
        .batch_execute(&format!("LISTEN property_{pid}"))
        .await
        .unwrap();

    // Connection 2: mutator
    let (client2, _rx2) = connect(addr).await;
    insert_booking(&client2, &pid, Ulid::new(), "2026-06-01", "2026-06-03").await;

    flush(&client1).await;

    let notif = recv_notification(&mut rx1, Duration::from_secs(5)).await;
    assert!(notif.is_some(), "expected notification");
    let notif = notif.unwrap();
    assert_eq!(notif.channel(), &format!("property_{pid}"));
    assert!(notif.payload().contains("BookingCreated"));
}

#[tokio::test]
async fn notification_payload_is_valid_json() {
    let (addr, _tm) = start_test_server().await;
    let (client1, mut rx1) = connect(addr).await;

    let pid = insert_property(&client1, Ulid::new()).await;
    client1
        .batch_execute(&format!("LISTEN property_{pid}"))
        .await
        .unwrap();

    let (client2, _) = connect(addr).await;
    insert_booking(&client2, &pid, Ulid::new(), "2026-06-01", "2026-06-03").await;

    flush(&client1).await;

    let notif = recv_notification(&mut rx1, Duration::from_secs(5))
        .await
        .expect("expected notification");

    let parsed: serde_json::Value = serde_json::from_str(notif.payload())
        .expect("notification payload should be valid JSON");
    assert!(parsed.is_object());
}

#[tokio::test]
async fn notification_only_on_subscribed_property() {
    let (addr, _tm) = start_test_server().await;
    let (client1, mut rx1) = connect(addr).await;

    let host = Ulid::new();
    let pid_a = insert_property(&client1, host).await;
    let pid_b = insert_property(&client1, host).await;

    // Listen only on A
    client1
        .batch_execute(&format!("LISTEN property_{pid_a}"))
        .await
        .unwrap();

    let (client2, _) = connect(addr).await;

    // Book B, should not reach the subscriber
    insert_booking(&client2, &pid_b, Ulid::new(), "2026-06-01", "2026-06-03").await;
    flush(&client1).await;
    let notif = recv_notification(&mut rx1, Duration::from_millis(500)).await;
    assert!(notif.is_none(), "should not receive notification for unsubscribed property");

    // Book A, should reach it
    insert_booking(&client2, &pid_a, Ulid::new(), "2026-06-01", "2026-06-03").await;
    flush(&client1).await;
    let notif = recv_notification(&mut rx1, Duration::from_secs(5)).await;
    assert!(notif.is_some(), "should receive notification for subscribed property");
}

#[tokio::test]
async fn listen_duplicate_is_idempotent() {
    let (addr, _tm) = start_test_server().await;
    let (client1, mut rx1) = connect(addr).await;

    let pid = insert_property(&client1, Ulid::new()).await;

    // Listen twice on the same channel
    client1
        .batch_execute(&format!("LISTEN property_{pid}"))
        .await
        .unwrap();
    client1
        .batch_execute(&format!("LISTEN property_{pid}"))
        .await
        .unwrap();

    let (client2, _) = connect(addr).await;
    insert_booking(&client2, &pid, Ulid::new(), "2026-06-01", "2026-06-03").await;

    flush(&client1).await;

    let notif1 = recv_notification(&mut rx1, Duration::from_secs(5)).await;
    assert!(notif1.is_some(), "should receive one notification");

    let notif2 = recv_notification(&mut rx1, Duration::from_millis(500)).await;
    assert!(notif2.is_none(), "should not receive duplicate notification");
}

#[tokio::test]
async fn unlisten_stops_notifications() {
    let (addr, _tm) = start_test_server().await;
    let (client1, mut rx1) = connect(addr).await;

    let pid = insert_property(&client1, Ulid::new()).await;
    client1
        .batch_execute(&format!("LISTEN property_{pid}"))
        .await
        .unwrap();
    client1
        .batch_execute(&format!("UNLISTEN property_{pid}"))
        .await
        .unwrap();

    let (client2, _) = connect(addr).await;
    insert_booking(&client2, &pid, Ulid::new(), "2026-06-01", "2026-06-03").await;

    flush(&client1).await;

    let notif = recv_notification(&mut rx1, Duration::from_millis(500)).await;
    assert!(notif.is_none(), "should not receive notification after UNLISTEN");
}

#[tokio::test]
async fn unlisten_all_stops_everything() {
    let (addr, _tm) = start_test_server().await;
    let (client1, mut rx1) = connect(addr).await;

    let host = Ulid::new();
    let pid_a = insert_property(&client1, host).await;
    let pid_b = insert_property(&client1, host).await;

    client1
        .batch_execute(&format!("LISTEN property_{pid_a}"))
        .await
        .unwrap();
    client1
        .batch_execute(&format!("LISTEN property_{pid_b}"))
        .await
        .unwrap();

    client1.batch_execute("UNLISTEN *").await.unwrap();

    let (client2, _) = connect(addr).await;
    insert_booking(&client2, &pid_a, Ulid::new(), "2026-06-01", "2026-06-03").await;
    insert_booking(&client2, &pid_b, Ulid::new(), "2026-06-01", "2026-06-03").await;

    flush(&client1).await;

    let notif = recv_notification(&mut rx1, Duration::from_millis(500)).await;
    assert!(notif.is_none(), "should not receive notifications after UNLISTEN *");
}

#[tokio::test]
async fn disconnect_cleans_up() {
    let (addr, _tm) = start_test_server().await;
    let (client1, _rx1) = connect(addr).await;

    let pid = insert_property(&client1, Ulid::new()).await;
    client1
        .batch_execute(&format!("LISTEN property_{pid}"))
        .await
        .unwrap();

    drop(client1);
    drop(_rx1);

    tokio::time::sleep(Duration::from_millis(200)).await;

    // Another connection still works fine
    let (client2, _) = connect(addr).await;
    insert_booking(&client2, &pid, Ulid::new(), "2026-06-01", "2026-06-03").await;
}

#[tokio::test]
async fn guest_channel_sees_waitlist_promotion() {
    let (addr, _tm) = start_test_server().await;

    let (host_client, _) = connect(addr).await;
    let pid = insert_property(&host_client, Ulid::new()).await;

    // A confirmed booking holds the dates
    let (booker_client, _) = connect(addr).await;
    let booker = Ulid::new();
    let booking_rows = booker_client
        .simple_query(&format!(
            "INSERT INTO bookings (property_id, guest, check_in, check_out, payment_method) \
             VALUES ('{pid}', '{booker}', '2026-06-01', '2026-06-03', 'transfer')"
        ))
        .await
        .unwrap();
    let booking_id = booking_rows
        .iter()
        .find_map(|m| match m {
            SimpleQueryMessage::Row(r) => Some(r.get("id").unwrap().to_string()),
            _ => None,
        })
        .unwrap();

    // The waitlisted guest subscribes to their own channel
    let (guest_client, mut guest_rx) = connect(addr).await;
    let guest = Ulid::new();
    guest_client
        .batch_execute(&format!(
            "INSERT INTO waitlist (property_id, guest) VALUES ('{pid}', '{guest}')"
        ))
        .await
        .unwrap();
    guest_client
        .batch_execute(&format!("LISTEN guest_{guest}"))
        .await
        .unwrap();

    // Cancellation frees the dates and promotes the guest
    booker_client
        .batch_execute(&format!(
            "UPDATE bookings SET status = 'canceled' WHERE id = '{booking_id}' AND guest = '{booker}'"
        ))
        .await
        .unwrap();

    flush(&guest_client).await;

    let notif = recv_notification(&mut guest_rx, Duration::from_secs(5)).await;
    assert!(notif.is_some(), "promoted guest should be notified");
    let notif = notif.unwrap();
    assert_eq!(notif.channel(), &format!("guest_{guest}"));
    assert!(notif.payload().contains("WaitlistNotified"));
}

#[tokio::test]
async fn multiple_events_on_same_channel() {
    let (addr, _tm) = start_test_server().await;
    let (client1, mut rx1) = connect(addr).await;

    let pid = insert_property(&client1, Ulid::new()).await;
    client1
        .batch_execute(&format!("LISTEN property_{pid}"))
        .await
        .unwrap();

    let (client2, _) = connect(addr).await;

    // Three non-overlapping stays
    for (ci, co) in [
        ("2026-06-01", "2026-06-03"),
        ("2026-06-03", "2026-06-05"),
        ("2026-06-05", "2026-06-07"),
    ] {
        insert_booking(&client2, &pid, Ulid::new(), ci, co).await;
    }

    flush(&client1).await;

    let mut count = 0;
    for _ in 0..3 {
        if recv_notification(&mut rx1, Duration::from_secs(5))
            .await
            .is_some()
        {
            count += 1;
        }
    }
    assert_eq!(count, 3, "should receive all 3 notifications");
}

#[tokio::test]
async fn rejected_booking_reports_sqlstate() {
    let (addr, _tm) = start_test_server().await;
    let (client, _rx) = connect(addr).await;

    let pid = insert_property(&client, Ulid::new()).await;
    insert_booking(&client, &pid, Ulid::new(), "2026-06-01", "2026-06-03").await;

    // Overlapping stay is refused with an exclusion-violation code
    let err = client
        .batch_execute(&format!(
            "INSERT INTO bookings (property_id, guest, check_in, check_out, payment_method) \
             VALUES ('{pid}', '{}', '2026-06-02', '2026-06-04', 'transfer')",
            Ulid::new()
        ))
        .await
        .unwrap_err();
    let code = err.code().expect("server error carries a SQLSTATE");
    assert_eq!(code.code(), "23P01");
}
