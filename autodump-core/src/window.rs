use std::collections::VecDeque;

/// Number of samples kept per resource unless configured otherwise.
pub const DEFAULT_WINDOW_CAPACITY: usize = 10;

/// Numeric sample that can be averaged.
pub trait Sample: Copy {
    fn as_f64(self) -> f64;
}

macro_rules! impl_sample {
    ($($t:ty),*) => {
        $(impl Sample for $t {
            #[inline]
            fn as_f64(self) -> f64 {
                self as f64
            }
        })*
    };
}

impl_sample!(u32, u64, usize, i32, i64, f32, f64);

/// Fixed-capacity history of the most recent samples of one metric.
///
/// Pushing into a full window evicts exactly the oldest sample, so the
/// window always holds the latest `capacity` samples in arrival order.
///
/// # Examples
/// ```
/// use autodump_core::window::RollingWindow;
///
/// let mut window = RollingWindow::with_capacity(3);
/// for n in [1u32, 2, 3, 4] {
///     window.push(n);
/// }
/// assert_eq!(window.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
/// assert_eq!(window.average(), Some(3.0));
/// ```
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T: Sample> RollingWindow<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WINDOW_CAPACITY)
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, sample: T) {
        self.samples.push_back(sample);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Arithmetic mean of the held samples, `None` while the window is empty.
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|s| s.as_f64()).sum();
        Some(sum / self.samples.len() as f64)
    }

    pub fn latest(&self) -> Option<T> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Sample> Default for RollingWindow<T> {
    fn default() -> Self {
        Self::new()
    }
}
