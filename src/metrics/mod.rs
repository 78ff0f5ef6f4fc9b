//! Prometheus metrics for the maxrows proxy
//!
//! Exposes metrics via HTTP endpoint for Prometheus scraping.

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::OnceLock;

/// Global metrics registry
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Get the global metrics instance
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// Proxy metrics collection
pub struct Metrics {
    /// Registry for all metrics
    pub registry: Registry,

    // Connection metrics
    /// Total client connections accepted
    pub connections_total: IntCounter,
    /// Current active client connections
    pub connections_active: IntGauge,
    /// Total client connections closed
    pub connections_closed: IntCounter,

    // Command metrics
    /// Commands seen, by whether their reply is counted
    pub commands_total: IntCounterVec,

    // Resultset metrics
    /// Completed replies by outcome (passed/discarded)
    pub resultsets_total: IntCounterVec,
    /// Rows seen per completed reply
    pub resultset_rows: HistogramVec,
    /// Limit hits by the limit that was crossed
    pub discards_total: IntCounterVec,
    /// Replies that could not be parsed
    pub protocol_errors_total: IntCounterVec,
}

impl Metrics {
    /// Create a new metrics collection
    ///
    /// # Panics
    ///
    /// Metric names and labels are static, so construction and registration
    /// only fail on a programming error.
    pub fn new() -> Self {
        let registry = Registry::new();

        // Connection metrics
        let connections_total = IntCounter::new(
            "maxrows_connections_total",
            "Total number of client connections accepted",
        )
        .unwrap();

        let connections_active = IntGauge::new(
            "maxrows_connections_active",
            "Current number of active client connections",
        )
        .unwrap();

        let connections_closed = IntCounter::new(
            "maxrows_connections_closed_total",
            "Total number of client connections closed",
        )
        .unwrap();

        // Command metrics
        let commands_total = IntCounterVec::new(
            Opts::new("maxrows_commands_total", "Total number of client commands"),
            &["kind"], // counted, uncounted
        )
        .unwrap();

        // Resultset metrics
        let resultsets_total = IntCounterVec::new(
            Opts::new(
                "maxrows_resultsets_total",
                "Total number of counted replies by outcome",
            ),
            &["outcome"], // passed, discarded
        )
        .unwrap();

        let resultset_rows = HistogramVec::new(
            HistogramOpts::new("maxrows_resultset_rows", "Rows per counted reply").buckets(vec![
                0.0, 1.0, 10.0, 100.0, 1000.0, 10000.0, 100000.0, 1000000.0,
            ]),
            &["outcome"],
        )
        .unwrap();

        let discards_total = IntCounterVec::new(
            Opts::new(
                "maxrows_discards_total",
                "Total number of replies discarded by limit",
            ),
            &["reason"], // rows, bytes
        )
        .unwrap();

        let protocol_errors_total = IntCounterVec::new(
            Opts::new(
                "maxrows_protocol_errors_total",
                "Total number of replies the filter could not parse",
            ),
            &["kind"], // malformed_length, truncated_eof, unexpected_data
        )
        .unwrap();

        // Register all metrics
        registry
            .register(Box::new(connections_total.clone()))
            .unwrap();
        registry
            .register(Box::new(connections_active.clone()))
            .unwrap();
        registry
            .register(Box::new(connections_closed.clone()))
            .unwrap();
        registry
            .register(Box::new(commands_total.clone()))
            .unwrap();
        registry
            .register(Box::new(resultsets_total.clone()))
            .unwrap();
        registry
            .register(Box::new(resultset_rows.clone()))
            .unwrap();
        registry
            .register(Box::new(discards_total.clone()))
            .unwrap();
        registry
            .register(Box::new(protocol_errors_total.clone()))
            .unwrap();

        Self {
            registry,
            connections_total,
            connections_active,
            connections_closed,
            commands_total,
            resultsets_total,
            resultset_rows,
            discards_total,
            protocol_errors_total,
        }
    }

    /// Record a new connection
    pub fn record_connection_accepted(&self) {
        self.connections_total.inc();
        self.connections_active.inc();
    }

    /// Record a connection closed
    pub fn record_connection_closed(&self) {
        self.connections_active.dec();
        self.connections_closed.inc();
    }

    /// Record a client command
    pub fn record_command(&self, counted: bool) {
        let kind = if counted { "counted" } else { "uncounted" };
        self.commands_total.with_label_values(&[kind]).inc();
    }

    /// Record the decision for a completed reply
    pub fn record_decision(&self, outcome: &str, rows: u64) {
        self.resultsets_total.with_label_values(&[outcome]).inc();
        self.resultset_rows
            .with_label_values(&[outcome])
            .observe(rows as f64);
    }

    /// Record a limit being crossed
    pub fn record_discard(&self, reason: &str) {
        self.discards_total.with_label_values(&[reason]).inc();
    }

    /// Record a reply the parser gave up on
    pub fn record_protocol_error(&self, kind: &str) {
        self.protocol_errors_total.with_label_values(&[kind]).inc();
    }

    /// Get metrics as Prometheus text format
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(addr: &str) -> anyhow::Result<()> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tracing::{error, info};

    fn respond(status: StatusCode, content_type: &str, body: String) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        if let Ok(value) = content_type.parse() {
            response
                .headers_mut()
                .insert(hyper::header::CONTENT_TYPE, value);
        }
        response
    }

    async fn handle_request(
        req: Request<hyper::body::Incoming>,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let response = match req.uri().path() {
            "/metrics" => respond(
                StatusCode::OK,
                "text/plain; version=0.0.4; charset=utf-8",
                metrics().gather(),
            ),
            "/health" => respond(StatusCode::OK, "text/plain", "OK".to_string()),
            _ => respond(StatusCode::NOT_FOUND, "text/plain", "Not Found".to_string()),
        };
        Ok(response)
    }

    let addr: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Metrics server listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(handle_request))
                .await
            {
                error!(error = %e, "Metrics server connection error");
            }
        });
    }
}
