use thiserror::Error;

pub const MIN_BLOCKS: usize = 2;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum StatsError {
    #[error("Block size must be at least 1")]
    ZeroBlockSize,

    #[error(
        "Only {blocks} full block(s) of {block_size} samples remain from {samples} samples after skipping {skip}; at least 2 are required"
    )]
    InsufficientData {
        samples: usize,
        skip: usize,
        block_size: usize,
        blocks: usize,
    },
}

/// Decorrelated mean of a time series with its standard error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockEstimate {
    pub mean: f64,
    pub standard_error: f64,
    pub blocks: usize,
}

impl BlockEstimate {
    /// Rescales an extensive estimate to a per-particle one.
    ///
    /// The mean is divided by `n`; the error by `sqrt(n)`, treating particle
    /// contributions as independent.
    pub fn per_particle(self, n: usize) -> Self {
        let n = n as f64;
        Self {
            mean: self.mean / n,
            standard_error: self.standard_error / n.sqrt(),
            blocks: self.blocks,
        }
    }
}

/// Block-averages `series`.
///
/// The first `skip` samples are discarded as equilibration, the rest is cut into
/// consecutive blocks of exactly `block_size` samples and a trailing partial block is
/// dropped. The mean is taken over the retained samples and the standard error is the
/// sample standard deviation of the block means over `sqrt(blocks)`.
///
/// Choosing `block_size` above the autocorrelation time is up to the caller.
pub fn block_average(
    series: &[f64],
    skip: usize,
    block_size: usize,
) -> Result<BlockEstimate, StatsError> {
    if block_size == 0 {
        return Err(StatsError::ZeroBlockSize);
    }

    let retained = series.get(skip..).unwrap_or(&[]);
    let blocks = retained.len() / block_size;
    if blocks < MIN_BLOCKS {
        return Err(StatsError::InsufficientData {
            samples: series.len(),
            skip,
            block_size,
            blocks,
        });
    }

    let block_means: Vec<f64> = retained
        .chunks_exact(block_size)
        .map(|block| block.iter().sum::<f64>() / block_size as f64)
        .collect();

    let n = blocks as f64;
    let mean = block_means.iter().sum::<f64>() / n;
    let variance = block_means
        .iter()
        .map(|m| (m - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);

    Ok(BlockEstimate {
        mean,
        standard_error: (variance / n).sqrt(),
        blocks,
    })
}
