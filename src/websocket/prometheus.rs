//! Prometheus text-exposition rendering (§6 ambient metrics surface).
//!
//! Grounded on the teacher's `websocket/prometheus.rs`: one `# HELP`/`# TYPE`
//! pair per metric, counters and gauges rendered with the same helper shape,
//! generalised from the teacher's relay/cross-instance counters down to the
//! flat `MetricsSnapshot` this repository actually tracks.

use crate::metrics::MetricsSnapshot;

pub(crate) fn render_prometheus_metrics(snapshot: &MetricsSnapshot) -> String {
    use std::fmt::Write;

    fn counter(buf: &mut String, name: &str, help: &str, value: u64) {
        let _ = writeln!(buf, "# HELP {name} {help}");
        let _ = writeln!(buf, "# TYPE {name} counter");
        let _ = writeln!(buf, "{name} {value}");
    }

    fn gauge(buf: &mut String, name: &str, help: &str, value: u64) {
        let _ = writeln!(buf, "# HELP {name} {help}");
        let _ = writeln!(buf, "# TYPE {name} gauge");
        let _ = writeln!(buf, "{name} {value}");
    }

    let mut buf = String::new();

    gauge(
        &mut buf,
        "meme_arena_connections_active",
        "Number of currently active WebSocket connections",
        snapshot.active_connections,
    );
    counter(
        &mut buf,
        "meme_arena_rooms_created_total",
        "Total rooms created since startup",
        snapshot.rooms_created,
    );
    counter(
        &mut buf,
        "meme_arena_games_started_total",
        "Total games started since startup",
        snapshot.games_started,
    );
    counter(
        &mut buf,
        "meme_arena_games_finished_total",
        "Total games finished since startup",
        snapshot.games_finished,
    );
    counter(
        &mut buf,
        "meme_arena_rounds_started_total",
        "Total rounds started since startup",
        snapshot.rounds_started,
    );
    counter(
        &mut buf,
        "meme_arena_internal_errors_total",
        "Total internal errors encountered since startup",
        snapshot.internal_errors,
    );

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ServerMetrics;

    #[test]
    fn render_includes_core_counters() {
        let metrics = ServerMetrics::new();
        metrics.increment_connections();
        metrics.increment_active_connections();
        metrics.increment_rooms_created();
        let snapshot = metrics.snapshot();
        let rendered = render_prometheus_metrics(&snapshot);

        assert!(rendered.contains("meme_arena_connections_active 1"));
        assert!(rendered.contains("meme_arena_rooms_created_total 1"));
        assert!(rendered.contains("# TYPE meme_arena_games_started_total counter"));
    }
}
