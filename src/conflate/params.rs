use serde::Deserialize;

/// Thresholds and limits of a conflation run.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConflateParams {
    /// Candidates at this distance in meters or farther are discarded.
    pub distance_threshold: f64,
    /// Maximum angle in degrees between a primary line and a candidate.
    pub angle_threshold: f64,
    pub slope_threshold: f64,
    /// Fuzzy ratio (0 to 100) above which an identity tag matches.
    pub match_threshold: u8,
    /// Weak candidates kept per primary feature before the scan stops.
    pub max_candidates: usize,
    pub workers: usize,
}

pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

impl Default for ConflateParams {
    fn default() -> Self {
        Self {
            distance_threshold: 7.0,
            angle_threshold: 17.0,
            slope_threshold: 4.0,
            match_threshold: 80,
            max_candidates: 7,
            workers: default_worker_count(),
        }
    }
}
