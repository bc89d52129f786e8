use std::panic::{self, AssertUnwindSafe};

use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::crs::projection::PlanarProjection;
use crate::error::{ConflateError, DatasetRole};
use crate::geofile::feature::Feature;

use super::decision::{evaluate, MatchResult};
use super::index::{prepare, PreparedFeature, SecondaryIndex};
use super::params::ConflateParams;

/// A primary feature whose scoring panicked.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFailure {
    /// Position of the feature in the primary dataset.
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConflationResult {
    /// Primary features merged onto existing secondary features.
    pub merged: Vec<Feature>,
    /// Primary features without a counterpart.
    pub new: Vec<Feature>,
    /// Primary features identical to an existing feature.
    pub dropped: usize,
    /// Primary features that cannot be conflated, e.g. points.
    pub skipped: usize,
    pub failures: Vec<FeatureFailure>,
}

impl ConflationResult {
    fn record(&mut self, result: MatchResult) {
        match result {
            MatchResult::Merged(feature) => self.merged.push(feature),
            MatchResult::New(feature) => self.new.push(feature),
            MatchResult::Dropped => self.dropped += 1,
        }
    }

    fn append(&mut self, mut other: ConflationResult) {
        self.merged.append(&mut other.merged);
        self.new.append(&mut other.new);
        self.dropped += other.dropped;
        self.skipped += other.skipped;
        self.failures.append(&mut other.failures);
    }
}

fn panic_reason(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run the scoring of one primary feature, turning a panic into a failure report.
fn guarded<F: FnOnce() -> MatchResult>(
    index: usize,
    score: F,
) -> Result<MatchResult, FeatureFailure> {
    panic::catch_unwind(AssertUnwindSafe(score)).map_err(|payload| FeatureFailure {
        index,
        reason: panic_reason(payload),
    })
}

fn conflate_chunk(
    chunk: &[PreparedFeature],
    index: &SecondaryIndex,
    params: &ConflateParams,
    progress: &ProgressBar,
) -> ConflationResult {
    let mut result = ConflationResult::default();
    for primary in chunk {
        match guarded(primary.index, || evaluate(primary, index, params)) {
            Ok(match_result) => result.record(match_result),
            Err(failure) => {
                log::error!(
                    "Conflating primary feature {} failed: {}",
                    failure.index,
                    failure.reason
                );
                result.failures.push(failure);
            }
        }
        progress.inc(1);
    }
    result
}

/// Conflate every primary feature against the secondary dataset.
///
/// Both datasets are projected once, then the primary features are split into one contiguous
/// chunk per worker and scored in parallel. Partial results are concatenated in chunk order, so
/// the output does not depend on the worker count.
pub fn conflate(
    primary: &[Feature],
    secondary: &[Feature],
    params: &ConflateParams,
) -> Result<ConflationResult, ConflateError> {
    if primary.is_empty() {
        return Err(ConflateError::EmptyDataset(DatasetRole::Primary));
    }
    if secondary.is_empty() {
        return Err(ConflateError::EmptyDataset(DatasetRole::Secondary));
    }

    let projection = PlanarProjection::web_mercator()?;
    let prepared_primary = prepare(primary, &projection);
    let index = SecondaryIndex::new(prepare(secondary, &projection));
    log::info!(
        "Conflating {} of {} primary features against {} of {} secondary features",
        prepared_primary.len(),
        primary.len(),
        index.len(),
        secondary.len()
    );

    let progress = ProgressBar::new(prepared_primary.len() as u64);
    let workers = params.workers.max(1);
    let mut result = if workers == 1 || prepared_primary.len() < workers {
        log::debug!("Running single threaded");
        conflate_chunk(&prepared_primary, &index, params, &progress)
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        let chunk_size = (prepared_primary.len() + workers - 1) / workers;
        log::debug!("Running {} workers on chunks of {}", workers, chunk_size);
        let partials: Vec<ConflationResult> = pool.install(|| {
            prepared_primary
                .par_chunks(chunk_size)
                .map(|chunk| conflate_chunk(chunk, &index, params, &progress))
                .collect()
        });
        partials
            .into_iter()
            .fold(ConflationResult::default(), |mut result, partial| {
                result.append(partial);
                result
            })
    };
    progress.finish_and_clear();

    result.skipped += primary.len() - prepared_primary.len();
    Ok(result)
}
