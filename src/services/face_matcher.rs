//! Identifies which enrolled employee a captured face belongs to.
//!
//! Candidates are compared in fixed-size batches. Each batch runs its
//! comparisons concurrently and is awaited as a whole; the search stops after a
//! batch once the running best reaches the early-exit similarity. Two
//! candidates scoring the same above that threshold resolve to whichever
//! comparison completed first, so the winner among exact ties depends on
//! timing.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::models::employee::Employee;
use crate::services::image_fetcher::{FetchError, ReferenceImageFetcher};
use crate::services::vision_service::{VisionError, VisionGateway};

pub const BATCH_SIZE: usize = 10;
pub const MIN_SIMILARITY: f64 = 70.0;
pub const EARLY_EXIT_SIMILARITY: f64 = 95.0;
pub const CANDIDATE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    pub batch_size: usize,
    /// Similarity below which a best match is rejected.
    pub min_similarity: f64,
    /// Similarity at which no further batches are searched.
    pub early_exit_similarity: f64,
    /// Upper bound for downloading and comparing one candidate.
    pub candidate_timeout: Duration,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            min_similarity: MIN_SIMILARITY,
            early_exit_similarity: EARLY_EXIT_SIMILARITY,
            candidate_timeout: CANDIDATE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub employee: Employee,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("no enrolled employee has a reference photo")]
    NoEnrolledEmployees,
    #[error("no employee matched, best similarity {best_similarity:.2}")]
    NoMatch { best_similarity: f64 },
}

#[derive(Debug, Error)]
enum CandidateError {
    #[error("reference photo download failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("face comparison failed: {0}")]
    Vision(#[from] VisionError),
    #[error("comparison timed out after {0:?}")]
    Timeout(Duration),
    #[error("employee has no reference photo")]
    MissingPhoto,
}

#[derive(Clone)]
pub struct FaceMatcher {
    vision: Arc<dyn VisionGateway>,
    fetcher: Arc<dyn ReferenceImageFetcher>,
    policy: MatchPolicy,
}

impl FaceMatcher {
    pub fn new(
        vision: Arc<dyn VisionGateway>,
        fetcher: Arc<dyn ReferenceImageFetcher>,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            vision,
            fetcher,
            policy,
        }
    }

    /// The caller must already have confirmed that `captured` contains a face.
    pub async fn identify(
        &self,
        captured: Arc<Vec<u8>>,
        candidates: Vec<Employee>,
    ) -> Result<MatchCandidate, MatchError> {
        let candidates: Vec<Employee> = candidates
            .into_iter()
            .filter(|employee| employee.photo_url.is_some())
            .collect();

        if candidates.is_empty() {
            return Err(MatchError::NoEnrolledEmployees);
        }

        let mut best: Option<MatchCandidate> = None;

        for (batch_index, batch) in candidates.chunks(self.policy.batch_size.max(1)).enumerate() {
            let mut tasks = JoinSet::new();

            for employee in batch {
                let vision = Arc::clone(&self.vision);
                let fetcher = Arc::clone(&self.fetcher);
                let captured = Arc::clone(&captured);
                let employee = employee.clone();
                let policy = self.policy;

                tasks.spawn(async move {
                    let outcome =
                        compare_candidate(vision.as_ref(), fetcher.as_ref(), &captured, &employee, &policy).await;
                    (employee, outcome)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                let (employee, outcome) = match joined {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(error = %e, "candidate comparison task aborted");
                        continue;
                    }
                };

                match outcome {
                    Ok(Some(similarity)) => {
                        debug!(employee_id = employee.id, similarity, "candidate scored");
                        let improves = best
                            .as_ref()
                            .map_or(true, |current| similarity > current.similarity);
                        if improves {
                            best = Some(MatchCandidate { employee, similarity });
                        }
                    }
                    Ok(None) => debug!(employee_id = employee.id, "no face match for candidate"),
                    Err(e) => warn!(employee_id = employee.id, error = %e, "skipping candidate"),
                }
            }

            if let Some(current) = &best {
                if current.similarity >= self.policy.early_exit_similarity {
                    info!(
                        employee_id = current.employee.id,
                        similarity = current.similarity,
                        batch = batch_index,
                        "high-confidence match, stopping search"
                    );
                    break;
                }
            }
        }

        match best {
            Some(candidate) if candidate.similarity >= self.policy.min_similarity => Ok(candidate),
            other => Err(MatchError::NoMatch {
                best_similarity: other.map_or(0.0, |candidate| candidate.similarity),
            }),
        }
    }
}

/// Highest similarity among the faces found in the candidate's reference
/// photo, or `None` when the vision service reported no match.
async fn compare_candidate(
    vision: &dyn VisionGateway,
    fetcher: &dyn ReferenceImageFetcher,
    captured: &[u8],
    employee: &Employee,
    policy: &MatchPolicy,
) -> Result<Option<f64>, CandidateError> {
    let url = employee.photo_url.as_deref().ok_or(CandidateError::MissingPhoto)?;

    let comparison = async {
        let reference = fetcher.fetch(url).await?;
        let matches = vision
            .compare_faces(captured, &reference, policy.min_similarity)
            .await?;
        Ok::<_, CandidateError>(matches.into_iter().map(|m| m.similarity).reduce(f64::max))
    };

    tokio::time::timeout(policy.candidate_timeout, comparison)
        .await
        .map_err(|_| CandidateError::Timeout(policy.candidate_timeout))?
}
