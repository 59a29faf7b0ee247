/// One-pass mean and variance accumulator (Welford's algorithm).
///
/// Tracks the count, the running mean and the running sum of squared
/// deviations, so millions of values can be folded in without a second
/// pass and without the cancellation error of the naive sum-of-squares
/// formula.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the values seen so far, `None` before the first value.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample variance (divides by `n - 1`); undefined below two values.
    pub fn sample_variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }

    pub fn sample_stddev(&self) -> Option<f64> {
        self.sample_variance().map(f64::sqrt)
    }
}

impl Extend<f64> for RunningStats {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl FromIterator<f64> for RunningStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = Self::new();
        stats.extend(iter);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::RunningStats;
    use proptest::prelude::*;

    #[test]
    fn textbook_example() {
        let stats: RunningStats = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter().collect();
        assert_eq!(stats.count(), 8);
        assert!((stats.mean().unwrap() - 5.0).abs() < 1e-12);
        assert!((stats.sample_variance().unwrap() - 32.0 / 7.0).abs() < 1e-12);
        assert!((stats.sample_stddev().unwrap() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn empty_and_single_value() {
        let empty = RunningStats::new();
        assert_eq!(empty.mean(), None);
        assert_eq!(empty.sample_variance(), None);

        let one: RunningStats = std::iter::once(3.5).collect();
        assert_eq!(one.mean(), Some(3.5));
        assert_eq!(one.sample_variance(), None);
    }

    #[test]
    fn large_offset_stays_accurate() {
        // Naive sum of squares loses everything here in f64.
        let base = 1e9;
        let stats: RunningStats = [4.0, 7.0, 13.0, 16.0].iter().map(|v| base + v).collect();
        assert!((stats.mean().unwrap() - (base + 10.0)).abs() < 1e-6);
        assert!((stats.sample_variance().unwrap() - 30.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn matches_two_pass(values in prop::collection::vec(-1000.0f64..1000.0, 2..500)) {
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);

            let stats: RunningStats = values.iter().copied().collect();
            prop_assert!((stats.mean().unwrap() - mean).abs() < 1e-9);
            prop_assert!((stats.sample_variance().unwrap() - var).abs() <= 1e-9 * var.max(1.0));
        }
    }
}
