use std::time::{Duration, Instant};

use crate::feature::GeomKind;

/// Counters and phase timers of one screening run.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunLog {
    layer_count: usize,
    successes: usize,
    errors: usize,
    intersection_errors: usize,
    started: Option<Instant>,
    fetch: Option<Duration>,
    point: Option<Duration>,
    line: Option<Duration>,
    polygon: Option<Duration>,
    total: Option<Duration>,
}

impl RunLog {
    pub(crate) fn start(&mut self, layer_count: usize) {
        *self = Self {
            layer_count,
            started: Some(Instant::now()),
            ..Self::default()
        };
    }

    pub(crate) fn record_layer(&mut self, success: bool) {
        if success {
            self.successes += 1;
        } else {
            self.errors += 1;
        }
    }

    pub(crate) fn finish_fetch(&mut self) {
        self.fetch = self.started.map(|t| t.elapsed());
    }

    pub(crate) fn record_kind(&mut self, kind: GeomKind, elapsed: Duration) {
        match kind {
            GeomKind::Point => self.point = Some(elapsed),
            GeomKind::Line => self.line = Some(elapsed),
            GeomKind::Polygon => self.polygon = Some(elapsed),
        }
    }

    pub(crate) fn add_intersection_errors(&mut self, count: usize) {
        self.intersection_errors += count;
    }

    pub(crate) fn finish(&mut self) {
        self.total = self.started.map(|t| t.elapsed());
    }

    #[inline]
    pub(crate) fn layer_count(&self) -> usize {
        self.layer_count
    }

    #[inline]
    pub(crate) fn successes(&self) -> usize {
        self.successes
    }

    #[inline]
    pub(crate) fn errors(&self) -> usize {
        self.errors
    }

    pub(crate) fn snapshot(&self) -> RunLogSnapshot {
        RunLogSnapshot {
            layer_count: self.layer_count,
            successes: self.successes,
            errors: self.errors,
            intersection_errors: self.intersection_errors,
            fetch: self.fetch.unwrap_or_default(),
            point: self.point.unwrap_or_default(),
            line: self.line.unwrap_or_default(),
            polygon: self.polygon.unwrap_or_default(),
            total: self.total.unwrap_or_default(),
        }
    }
}

/// Read-only view of the run log handed to callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunLogSnapshot {
    pub layer_count: usize,
    pub successes: usize,
    pub errors: usize,
    pub intersection_errors: usize,
    pub fetch: Duration,
    pub point: Duration,
    pub line: Duration,
    pub polygon: Duration,
    pub total: Duration,
}
