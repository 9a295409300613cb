use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own scrape listener and register
/// all application counters up front so they appear before the first event.
pub fn init_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    counter!("logs_processed").absolute(0);
    counter!("trades_opened").absolute(0);
    counter!("trades_closed").absolute(0);
    counter!("trades_recorded").absolute(0);
    counter!("alerts_sent").absolute(0);
    counter!("poll_trades_total").absolute(0);

    Ok(())
}
