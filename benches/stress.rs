use std::time::{Duration, Instant};

use chrono::{Duration as Days, NaiveDate};
use tokio_postgres::{Config, NoTls, SimpleQueryMessage};
use ulid::Ulid;

async fn connect(host: &str, port: u16) -> tokio_postgres::Client {
    connect_db(host, port, &format!("bench_{}", Ulid::new())).await
}

async fn connect_db(host: &str, port: u16, db: &str) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(db)
        .user("hearth")
        .password("hearth");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

/// One-night stay starting `i` days after the base date.
fn stay(i: i64) -> (String, String) {
    let base = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    let ci = base + Days::days(i);
    let co = ci + Days::days(1);
    (ci.to_string(), co.to_string())
}

async fn create_property(client: &tokio_postgres::Client, host: Ulid) -> String {
    let rows = client
        .simple_query(&format!(
            "INSERT INTO properties (host, title, price_per_night, max_guests) \
             VALUES ('{host}', 'Bench flat', 100.00, 4)"
        ))
        .await
        .unwrap();
    rows.iter()
        .find_map(|m| match m {
            SimpleQueryMessage::Row(r) => Some(r.get("id").unwrap().to_string()),
            _ => None,
        })
        .expect("INSERT did not return the new id")
}

async fn book(client: &tokio_postgres::Client, pid: &str, i: i64) {
    let (ci, co) = stay(i);
    let guest = Ulid::new();
    client
        .batch_execute(&format!(
            "INSERT INTO bookings (property_id, guest, check_in, check_out, payment_method) \
             VALUES ('{pid}', '{guest}', '{ci}', '{co}', 'transfer')"
        ))
        .await
        .unwrap();
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

async fn phase1_sequential(host: &str, port: u16) {
    let client = connect(host, port).await;
    let pid = create_property(&client, Ulid::new()).await;

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        book(&client, &pid, i as i64).await;
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

async fn phase2_concurrent(host: &str, port: u16) {
    let n_tasks = 10;
    let n_per_task = 200;

    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..n_tasks {
        let host = host.to_string();
        handles.push(tokio::spawn(async move {
            // Each task gets its own tenant (unique dbname from connect())
            let client = connect(&host, port).await;
            let pid = create_property(&client, Ulid::new()).await;
            for j in 0..n_per_task {
                book(&client, &pid, j as i64).await;
            }
        }));
    }

    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_read_under_load(host: &str, port: u16) {
    // Writer tasks: continuously add bookings in the background
    let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for _ in 0..5 {
        let host = host.to_string();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let pid = create_property(&client, Ulid::new()).await;
            let mut i = 0i64;
            while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                let (ci, co) = stay(i % 10_000);
                let guest = Ulid::new();
                let _ = client
                    .batch_execute(&format!(
                        "INSERT INTO bookings (property_id, guest, check_in, check_out, payment_method) \
                         VALUES ('{pid}', '{guest}', '{ci}', '{co}', 'transfer')"
                    ))
                    .await;
                i += 1;
            }
        }));
    }

    // Reader tasks: probe availability and measure latency. Each reader
    // pre-fills its own tenant so the check walks a non-trivial calendar.
    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();

    for _ in 0..n_readers {
        let host = host.to_string();
        reader_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let pid = create_property(&client, Ulid::new()).await;
            for i in 0..50 {
                book(&client, &pid, i).await;
            }

            let mut latencies = Vec::with_capacity(reads_per_reader);
            for r in 0..reads_per_reader {
                let (ci, co) = stay(100 + (r as i64 % 200));
                let t = Instant::now();
                client
                    .batch_execute(&format!(
                        "SELECT * FROM availability WHERE property_id = '{pid}' \
                         AND check_in = '{ci}' AND check_out = '{co}'"
                    ))
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }

    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("availability query", &mut all_latencies);
}

async fn phase4_connection_storm(host: &str, port: u16) {
    let n_conns = 50;
    let ops_per_conn = 10;

    let start = Instant::now();
    let mut handles = Vec::new();
    let success = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

    // Connections fan in on a small pool of shared tenants
    for c in 0..n_conns {
        let host = host.to_string();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let client = connect_db(&host, port, &format!("storm_{}", c % 8)).await;
            let pid = create_property(&client, Ulid::new()).await;
            for i in 0..ops_per_conn {
                book(&client, &pid, i as i64).await;
            }
            success.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    let ok = success.load(std::sync::atomic::Ordering::Relaxed);
    println!(
        "  {n_conns} connections, {ops_per_conn} ops each: {ok}/{n_conns} succeeded in {:.2}s",
        elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let host = std::env::var("HEARTH_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("HEARTH_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid HEARTH_PORT");

    println!("=== hearth stress benchmark ===");
    println!("target: {host}:{port}\n");

    // Each phase uses its own tenant (unique dbname) to avoid interference

    println!("[phase 1] sequential write throughput");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] concurrent write throughput");
    phase2_concurrent(&host, port).await;

    println!("\n[phase 3] read latency under write load");
    phase3_read_under_load(&host, port).await;

    println!("\n[phase 4] connection storm");
    phase4_connection_storm(&host, port).await;

    println!("\n=== benchmark complete ===");
}
