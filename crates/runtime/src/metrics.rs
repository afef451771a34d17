use std::collections::BTreeMap;

/// Well-known metric names recorded while driving a session.
pub mod names {
    pub const CHUNKS_RECEIVED: &str = "stream.chunks";
    pub const STREAM_BYTES: &str = "stream.bytes";
    pub const FRAMES_APPLIED: &str = "frames.applied";
    pub const FRAMES_MALFORMED: &str = "frames.malformed";
    pub const FRAMES_IGNORED: &str = "frames.ignored";
    pub const RUNS_STARTED: &str = "runs.started";
    pub const RUNS_CANCELLED: &str = "runs.cancelled";
    pub const OVERLAYS_COMMITTED: &str = "overlay.committed";
    pub const OVERLAYS_STALE: &str = "overlay.stale";
    pub const OVERLAYS_FAILED: &str = "overlay.failed";
    pub const GENERATION: &str = "session.generation";
}

/// Counters, gauges and value distributions for one controller.
///
/// Keys live in sorted maps so snapshots come out in a stable order
/// regardless of recording order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<&'static str, u64>,
    gauges: BTreeMap<&'static str, i64>,
    distributions: BTreeMap<&'static str, Distribution>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Distribution {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl Distribution {
    pub fn record(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum = self.sum.saturating_add(value);
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub counters: Vec<(&'static str, u64)>,
    pub gauges: Vec<(&'static str, i64)>,
    pub distributions: Vec<(&'static str, Distribution)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn incr(&mut self, name: &'static str) {
        self.add(name, 1);
    }

    pub fn add(&mut self, name: &'static str, by: u64) {
        *self.counters.entry(name).or_insert(0) += by;
    }

    pub fn gauge(&self, name: &str) -> Option<i64> {
        self.gauges.get(name).copied()
    }

    pub fn set_gauge(&mut self, name: &'static str, value: i64) {
        self.gauges.insert(name, value);
    }

    pub fn record(&mut self, name: &'static str, value: u64) {
        self.distributions.entry(name).or_default().record(value);
    }

    pub fn distribution(&self, name: &str) -> Option<Distribution> {
        self.distributions.get(name).copied()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.iter().map(|(k, v)| (*k, *v)).collect(),
            gauges: self.gauges.iter().map(|(k, v)| (*k, *v)).collect(),
            distributions: self.distributions.iter().map(|(k, v)| (*k, *v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Distribution, Metrics, names};

    #[test]
    fn counters_accumulate() {
        let mut m = Metrics::new();
        m.incr(names::FRAMES_APPLIED);
        m.add(names::FRAMES_APPLIED, 2);
        assert_eq!(m.counter(names::FRAMES_APPLIED), 3);
        assert_eq!(m.counter(names::FRAMES_MALFORMED), 0);
    }

    #[test]
    fn gauges_overwrite() {
        let mut m = Metrics::new();
        assert_eq!(m.gauge(names::GENERATION), None);
        m.set_gauge(names::GENERATION, 1);
        m.set_gauge(names::GENERATION, 2);
        assert_eq!(m.gauge(names::GENERATION), Some(2));
    }

    #[test]
    fn distribution_tracks_bounds() {
        let mut d = Distribution::default();
        assert_eq!(d.mean(), None);
        d.record(5);
        d.record(2);
        d.record(11);
        assert_eq!((d.count, d.sum, d.min, d.max), (3, 18, 2, 11));
        assert_eq!(d.mean(), Some(6.0));
    }

    #[test]
    fn snapshot_is_sorted_by_name() {
        let mut m = Metrics::new();
        m.incr(names::RUNS_STARTED);
        m.incr(names::FRAMES_APPLIED);
        m.record(names::STREAM_BYTES, 64);

        let snap = m.snapshot();
        assert_eq!(
            snap.counters,
            vec![(names::FRAMES_APPLIED, 1), (names::RUNS_STARTED, 1)]
        );
        assert_eq!(snap.distributions[0].0, names::STREAM_BYTES);
    }
}
