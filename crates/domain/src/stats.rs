//! Rolling-window statistics for activity detection.

use std::collections::VecDeque;

/// Sample (Bessel-corrected) standard deviation.
///
/// Returns `None` for fewer than two samples, where the value is undefined.
#[must_use]
pub fn sample_std_dev(samples: &[f64]) -> Option<f64> {
    std_dev_of(samples.iter().copied(), samples.len())
}

#[allow(clippy::cast_precision_loss)]
fn std_dev_of(samples: impl Iterator<Item = f64> + Clone, len: usize) -> Option<f64> {
    if len < 2 {
        return None;
    }
    let n = len as f64;
    let mean = samples.clone().sum::<f64>() / n;
    let sum_sq = samples.map(|x| (x - mean).powi(2)).sum::<f64>();
    Some((sum_sq / (n - 1.0)).sqrt())
}

/// Fixed-capacity window of the most recent samples.
///
/// Pushing beyond capacity drops the oldest sample.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    samples: VecDeque<f64>,
}

impl RollingWindow {
    /// Create an empty window holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append samples in chronological order.
    pub fn extend(&mut self, samples: &[f64]) {
        for &sample in samples {
            if self.samples.len() == self.capacity {
                self.samples.pop_front();
            }
            self.samples.push_back(sample);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the window holds `capacity` samples.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Sample standard deviation of the current contents.
    #[must_use]
    pub fn std_dev(&self) -> Option<f64> {
        std_dev_of(self.samples.iter().copied(), self.samples.len())
    }
}
