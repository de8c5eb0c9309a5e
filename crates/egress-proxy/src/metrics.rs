//! Purely observational counters, modeled on `headers-proxy`'s
//! `HeadersProxyMetrics`: none of these gate a request, they only describe
//! what the proxy has done.

use prometheus::{IntCounter, IntGauge, Registry};

pub struct ProxyMetrics {
    pub requests_total: IntCounter,
    pub connect_tunnels_total: IntCounter,
    pub log_append_failures_total: IntCounter,
    pub active_connections: IntGauge,
}

impl ProxyMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let requests_total =
            IntCounter::new("egress_requests_total", "HTTP forward requests handled")?;
        let connect_tunnels_total = IntCounter::new(
            "egress_connect_tunnels_total",
            "HTTPS CONNECT tunnels established",
        )?;
        let log_append_failures_total = IntCounter::new(
            "egress_log_append_failures_total",
            "Signed log entries that failed to append",
        )?;
        let active_connections = IntGauge::new(
            "egress_active_connections",
            "Proxy connections currently being served",
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(connect_tunnels_total.clone()))?;
        registry.register(Box::new(log_append_failures_total.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;

        Ok(Self {
            requests_total,
            connect_tunnels_total,
            log_append_failures_total,
            active_connections,
        })
    }
}
