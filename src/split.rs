use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::error::{ExportError, Result};

pub const DEFAULT_SEED: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitStats {
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Randomly moves `round(rows * test_ratio)` rows of a headered CSV into
/// `test`, in sampled order, and writes the rest to `train` in their original
/// order. The same seed always yields the same split.
pub fn split_csv(
    input: &Path,
    test_ratio: f64,
    train: &Path,
    test: &Path,
    seed: u64,
) -> Result<SplitStats> {
    if !(0.0..=1.0).contains(&test_ratio) {
        return Err(ExportError::Config(format!(
            "test ratio must be between 0.0 and 1.0, got {}",
            test_ratio
        )));
    }

    info!(input = %input.display(), "Reading rows");
    let mut reader = csv::Reader::from_path(input)?;
    let headers = reader.headers()?.clone();
    let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;

    let test_count = (records.len() as f64 * test_ratio).round() as usize;
    info!(
        ratio = test_ratio,
        rows = records.len(),
        test_rows = test_count,
        "Splitting off test rows"
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let sampled = index::sample(&mut rng, records.len(), test_count).into_vec();
    let sampled_set: HashSet<usize> = sampled.iter().copied().collect();

    info!(path = %train.display(), "Writing train rows");
    let mut train_writer = csv::Writer::from_path(train)?;
    train_writer.write_record(&headers)?;
    for (_, record) in records
        .iter()
        .enumerate()
        .filter(|(i, _)| !sampled_set.contains(i))
    {
        train_writer.write_record(record)?;
    }
    train_writer.flush()?;

    info!(path = %test.display(), "Writing test rows");
    let mut test_writer = csv::Writer::from_path(test)?;
    test_writer.write_record(&headers)?;
    for &i in &sampled {
        test_writer.write_record(&records[i])?;
    }
    test_writer.flush()?;

    Ok(SplitStats {
        train_rows: records.len() - test_count,
        test_rows: test_count,
    })
}
