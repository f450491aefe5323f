use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Frequency distribution over a fixed number of equal-width bins starting at zero.
///
/// The bin width is derived from the data: the largest value divided by the bin count,
/// stretched by `range_widening_factor` so that the maximum lands inside the last bin
/// rather than on its upper edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    bin_count: usize,
    range_widening_factor: f64,
}

impl Histogram {
    /// Creates a histogram. Fails if `bin_count` is zero or `range_widening_factor` is not
    /// strictly greater than 1.
    pub fn new(bin_count: usize, range_widening_factor: f64) -> Result<Self> {
        if bin_count == 0 {
            anyhow::bail!("bin_count must be greater than 0.");
        }
        if !range_widening_factor.is_finite() || range_widening_factor <= 1.0 {
            anyhow::bail!(
                "range_widening_factor must be greater than 1 to ensure that all data falls into a histogram bin (got {}).",
                range_widening_factor
            );
        }
        Ok(Self { bin_count, range_widening_factor })
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    pub fn range_widening_factor(&self) -> f64 {
        self.range_widening_factor
    }

    /// Width of a single bin for the given data set. Zero for empty data.
    pub fn bin_range(&self, data: &[f64]) -> f64 {
        let max = data.iter().copied().fold(0.0f64, f64::max);
        (max / self.bin_count as f64) * self.range_widening_factor
    }

    /// Counts how many values fall into each bin.
    pub fn frequencies(&self, data: &[f64]) -> Vec<usize> {
        let mut frequencies = vec![0usize; self.bin_count];
        if data.is_empty() {
            return frequencies;
        }

        let bin_range = self.bin_range(data);
        let last_bin = self.bin_count - 1;
        for &value in data {
            let bin = if bin_range > 0.0 {
                // `as` saturates: negative and NaN values map to bin 0.
                ((value / bin_range) as usize).min(last_bin)
            } else {
                0
            };
            frequencies[bin] += 1;
        }
        frequencies
    }
}
