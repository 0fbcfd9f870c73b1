//! Seeded train/test partitioning.

use crate::config::SplitConfig;
use crate::error::{AirfareError, Result};
use polars::prelude::*;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Row indices of the two partitions, in shuffled order.
///
/// `n_test = ceil(test_size * n_rows)`; the first `n_test` shuffled indices
/// form the test partition.
///
/// # Errors
///
/// Fails when either partition would be empty.
pub fn split_indices(n_rows: usize, config: &SplitConfig) -> Result<(Vec<usize>, Vec<usize>)> {
    let n_test = (config.test_size * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(AirfareError::DataProcessing(format!(
            "test_size {} leaves an empty partition for {n_rows} rows",
            config.test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(config.random_state);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Split `df` into `(train, test)`.
///
/// # Errors
///
/// Fails when either partition would be empty.
pub fn train_test_split(df: &DataFrame, config: &SplitConfig) -> Result<(DataFrame, DataFrame)> {
    let (train_rows, test_rows) = split_indices(df.height(), config)?;
    Ok((take_rows(df, &train_rows)?, take_rows(df, &test_rows)?))
}

fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec(
        "idx".into(),
        rows.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}
