use prometheus::{IntCounter, Opts, Registry};

/// Process-wide counters, owned by whoever starts the server and handed to
/// the game on startup.
pub struct Metrics {
    registry: Registry,
    connections: IntCounter,
    disconnections: IntCounter,
    rejected_moves: IntCounter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub connections: u64,
    pub disconnections: u64,
    pub rejected_moves: u64,
}
impl MetricsSnapshot {
    pub fn online(&self) -> u64 {
        self.connections.saturating_sub(self.disconnections)
    }
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let connections = IntCounter::with_opts(Opts::new(
            "connections_total",
            "participants admitted to the game",
        ))?;
        let disconnections = IntCounter::with_opts(Opts::new(
            "disconnections_total",
            "participants removed from the game",
        ))?;
        let rejected_moves = IntCounter::with_opts(Opts::new(
            "rejected_moves_total",
            "movement packets dropped as implausible",
        ))?;

        let registry = Registry::new_custom(Some("chunkserv".to_owned()), None)?;
        registry.register(Box::new(connections.clone()))?;
        registry.register(Box::new(disconnections.clone()))?;
        registry.register(Box::new(rejected_moves.clone()))?;

        Ok(Self { registry, connections, disconnections, rejected_moves })
    }
    /// Where the counters are registered, for exporting them.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
    pub fn player_connected(&self) {
        self.connections.inc();
    }
    pub fn player_disconnected(&self) {
        self.disconnections.inc();
    }
    pub fn move_rejected(&self) {
        self.rejected_moves.inc();
    }
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections: self.connections.get(),
            disconnections: self.disconnections.get(),
            rejected_moves: self.rejected_moves.get(),
        }
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Metrics").field(&self.snapshot()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_counts_joins_minus_leaves() {
        let metrics = Metrics::new().unwrap();
        metrics.player_connected();
        metrics.player_connected();
        metrics.player_disconnected();
        metrics.move_rejected();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.online(), 1);
        assert_eq!(snapshot.rejected_moves, 1);
    }

    #[test]
    fn counters_are_exported_under_the_server_namespace() {
        let metrics = Metrics::new().unwrap();
        metrics.player_connected();
        let families = metrics.registry().gather();
        let names: Vec<_> = families.iter().map(|f| f.get_name()).collect();
        assert_eq!(
            names,
            ["chunkserv_connections_total", "chunkserv_disconnections_total", "chunkserv_rejected_moves_total"]
        );
    }
}
