//! Prometheus-compatible metrics endpoint
//!
//! Exposes matchmaking, bot and training-session gauges in Prometheus format.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Metrics registry for the matchmaking subsystem
#[derive(Debug)]
pub struct Metrics {
    // Connection pools
    pub waiting_connections: AtomicU64,
    pub active_connections: AtomicU64,

    // Participants
    pub human_players: AtomicU64,
    pub bot_players: AtomicU64,
    pub alive_players: AtomicU64,

    // Match state (0=idle, 1=countdown, 2=versus, 3=active)
    pub match_state: AtomicU64,
    pub matches_started: AtomicU64,

    // Training sessions
    pub training_sessions: AtomicU64,
    pub training_sessions_reaped: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    start_time: Instant,

    // Rolling tick times for percentile calculation
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            waiting_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            human_players: AtomicU64::new(0),
            bot_players: AtomicU64::new(0),
            alive_players: AtomicU64::new(0),
            match_state: AtomicU64::new(0),
            matches_started: AtomicU64::new(0),
            training_sessions: AtomicU64::new(0),
            training_sessions_reaped: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(1000)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > 1000 {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us
                .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us
                .store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us
                .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("gridclaim_connections_waiting", "Connections in the waiting pool", "gauge",
            self.waiting_connections.load(Ordering::Relaxed));
        metric!("gridclaim_connections_active", "Connections in the active pool", "gauge",
            self.active_connections.load(Ordering::Relaxed));

        metric!("gridclaim_players_human", "Number of human players", "gauge",
            self.human_players.load(Ordering::Relaxed));
        metric!("gridclaim_players_bot", "Number of bot players", "gauge",
            self.bot_players.load(Ordering::Relaxed));
        metric!("gridclaim_players_alive", "Number of alive players", "gauge",
            self.alive_players.load(Ordering::Relaxed));

        metric!("gridclaim_match_state", "Match state (0=idle, 1=countdown, 2=versus, 3=active)", "gauge",
            self.match_state.load(Ordering::Relaxed));
        metric!("gridclaim_matches_started_total", "Total matches started", "counter",
            self.matches_started.load(Ordering::Relaxed));

        metric!("gridclaim_training_sessions", "Active training sessions", "gauge",
            self.training_sessions.load(Ordering::Relaxed));
        metric!("gridclaim_training_sessions_reaped_total", "Idle training sessions reaped", "counter",
            self.training_sessions_reaped.load(Ordering::Relaxed));

        metric!("gridclaim_tick_time_microseconds", "Current tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("gridclaim_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("gridclaim_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("gridclaim_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("gridclaim_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("gridclaim_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);

                    let response = if request.starts_with("GET /metrics") {
                        let body = metrics.to_prometheus();
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    } else if request.starts_with("GET /health") || request.starts_with("GET /") {
                        let body = "OK";
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                    };

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.bot_players.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_tick_time() {
        let metrics = Metrics::new();

        for i in 0..100 {
            metrics.record_tick_time(Duration::from_micros(100 + i * 10));
        }

        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 100);
        assert!(metrics.tick_time_p95_us.load(Ordering::Relaxed) > 0);
        assert!(metrics.tick_time_p99_us.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.human_players.store(5, Ordering::Relaxed);
        metrics.bot_players.store(3, Ordering::Relaxed);
        metrics.training_sessions.store(2, Ordering::Relaxed);

        let output = metrics.to_prometheus();

        assert!(output.contains("gridclaim_players_human 5"));
        assert!(output.contains("gridclaim_players_bot 3"));
        assert!(output.contains("gridclaim_training_sessions 2"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }
}
