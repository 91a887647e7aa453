/// Bounded per-channel sample buffers feeding downstream consumers
use std::collections::VecDeque;

use crate::models::{Channel, Sample};
use crate::utils::format_time_label;

/// FIFO window of (label, value) pairs capped at `capacity` entries
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow {
    capacity: usize,
    labels: VecDeque<String>,
    values: VecDeque<f64>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        RollingWindow {
            capacity,
            labels: VecDeque::with_capacity(capacity + 1),
            values: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append a sample, then evict the oldest entry if over capacity
    pub fn push(&mut self, sample: Sample) {
        self.labels.push_back(format_time_label(&sample.timestamp));
        self.values.push_back(sample.value);

        if self.labels.len() > self.capacity {
            self.labels.pop_front();
            self.values.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}

/// One independent window per channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelWindows {
    windows: [RollingWindow; 4],
}

impl ChannelWindows {
    pub fn new(capacity: usize) -> Self {
        ChannelWindows {
            windows: std::array::from_fn(|_| RollingWindow::new(capacity)),
        }
    }

    pub fn get(&self, channel: Channel) -> &RollingWindow {
        &self.windows[channel.index()]
    }

    pub fn get_mut(&mut self, channel: Channel) -> &mut RollingWindow {
        &mut self.windows[channel.index()]
    }
}
