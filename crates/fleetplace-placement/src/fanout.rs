//! Fan-out coordinator — scatter a score query, gather under one deadline.
//!
//! Every candidate gets its own spawned call. All of them share a single
//! deadline measured from the start of fan-out; whatever has not answered
//! by then is aborted and counted as a failure of that host alone.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use fleetplace_core::{HostId, PlacementOutcome, Resource, ResultCode, Score};

use crate::error::PlacementError;
use crate::ports::{Candidates, HostScorer};

pub struct FanOutCoordinator {
    scorer: Arc<dyn HostScorer>,
}

impl FanOutCoordinator {
    pub fn new(scorer: Arc<dyn HostScorer>) -> Self {
        Self { scorer }
    }

    /// Score `resource` on every candidate and pick the best responder.
    ///
    /// Dropping the returned future aborts every outstanding host call.
    pub async fn place(
        &self,
        candidates: &Candidates,
        resource: &Resource,
        timeout: Duration,
    ) -> PlacementOutcome {
        if candidates.is_empty() {
            let err = PlacementError::NoCandidates;
            return PlacementOutcome::failed(err.result_code(), err.to_string());
        }

        let deadline = Instant::now() + timeout;
        let resource = Arc::new(resource.clone());
        let mut calls = JoinSet::new();

        for (host_id, address) in candidates {
            let scorer = Arc::clone(&self.scorer);
            let resource = Arc::clone(&resource);
            let host_id = host_id.clone();
            let address = address.clone();
            calls.spawn(async move {
                let result = scorer.score(&address, &resource).await;
                (host_id, result)
            });
        }
        debug!(candidates = candidates.len(), ?timeout, "fan-out started");

        let mut scores: BTreeMap<HostId, Score> = BTreeMap::new();
        while let Some(joined) = timeout_at(deadline, calls.join_next()).await.ok().flatten() {
            match joined {
                Ok((host_id, Ok(score))) => {
                    debug!(host = %host_id, %score, "host responded");
                    scores.insert(host_id, score);
                }
                Ok((host_id, Err(e))) => {
                    warn!(host = %host_id, error = %e, "host call failed");
                }
                Err(e) => {
                    warn!(error = %e, "host call task panicked");
                }
            }
        }

        if !calls.is_empty() {
            warn!(
                pending = calls.len(),
                "hosts did not respond before the deadline"
            );
            calls.abort_all();
        }

        match reduce(candidates, &scores) {
            Some(outcome) => {
                info!(
                    host = outcome.host_id.as_deref().unwrap_or_default(),
                    responded = scores.len(),
                    candidates = candidates.len(),
                    "host selected"
                );
                outcome
            }
            None => {
                warn!(candidates = candidates.len(), "no host responded");
                PlacementOutcome::failed(
                    ResultCode::SystemError,
                    format!("Received no response in {}ms", timeout.as_millis()),
                )
            }
        }
    }
}

/// Pick the highest score among responders.
///
/// Scores compare by utilization, then transfer. Exact ties go to the
/// first responder in candidate (host-id) order, so the result never
/// depends on arrival order. `None` when nobody responded.
pub fn reduce(
    candidates: &Candidates,
    scores: &BTreeMap<HostId, Score>,
) -> Option<PlacementOutcome> {
    let mut best: Option<(&HostId, Score)> = None;
    for (host_id, score) in scores {
        if !candidates.contains_key(host_id) {
            continue;
        }
        if best.is_none_or(|(_, top)| *score > top) {
            best = Some((host_id, *score));
        }
    }

    let (host_id, score) = best?;
    let address = candidates.get(host_id)?.clone();
    Some(PlacementOutcome::selected(host_id.clone(), address, score))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use fleetplace_core::ServerAddress;

    use super::*;
    use crate::error::HostCallError;

    #[derive(Clone, Copy)]
    enum Reply {
        Score(i32, i32),
        Fail,
        Hang,
        After(u64, i32, i32),
    }

    struct FakeScorer {
        replies: HashMap<String, Reply>,
        calls: AtomicUsize,
    }

    impl FakeScorer {
        fn new(replies: &[(&str, Reply)]) -> Arc<Self> {
            Arc::new(Self {
                replies: replies
                    .iter()
                    .map(|(h, r)| (h.to_string(), *r))
                    .collect(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HostScorer for FakeScorer {
        async fn score(
            &self,
            address: &ServerAddress,
            _resource: &Resource,
        ) -> Result<Score, HostCallError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.get(&address.host).copied() {
                Some(Reply::Score(u, t)) => Ok(Score::new(u, t)),
                Some(Reply::After(ms, u, t)) => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok(Score::new(u, t))
                }
                Some(Reply::Hang) => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Err(HostCallError::Timeout)
                }
                Some(Reply::Fail) | None => {
                    Err(HostCallError::Unreachable(address.to_string()))
                }
            }
        }
    }

    fn candidates(hosts: &[&str]) -> Candidates {
        hosts
            .iter()
            .map(|h| (h.to_string(), ServerAddress::new(*h, 8835)))
            .collect()
    }

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn partial_failure_selects_best_responder() {
        let scorer = FakeScorer::new(&[
            ("h1", Reply::Score(10, 5)),
            ("h2", Reply::Score(10, 9)),
            ("h3", Reply::Hang),
            ("h4", Reply::Hang),
        ]);
        let coordinator = FanOutCoordinator::new(scorer.clone());

        let started = Instant::now();
        let outcome = coordinator
            .place(
                &candidates(&["h1", "h2", "h3", "h4"]),
                &Resource::default(),
                TIMEOUT,
            )
            .await;

        assert_eq!(outcome.result, ResultCode::Ok);
        assert_eq!(outcome.host_id.as_deref(), Some("h2"));
        assert_eq!(outcome.score, Some(Score::new(10, 9)));
        assert_eq!(outcome.address, Some(ServerAddress::new("h2", 8835)));
        assert_eq!(scorer.calls(), 4);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn empty_candidates_make_no_calls() {
        let scorer = FakeScorer::new(&[]);
        let coordinator = FanOutCoordinator::new(scorer.clone());

        let outcome = coordinator
            .place(&Candidates::new(), &Resource::default(), TIMEOUT)
            .await;

        assert_eq!(outcome.result, ResultCode::NoSuchResource);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Place failure, constraints cannot be satisfied for request")
        );
        assert_eq!(scorer.calls(), 0);
    }

    #[tokio::test]
    async fn all_failed_is_system_error() {
        let scorer = FakeScorer::new(&[
            ("h1", Reply::Fail),
            ("h2", Reply::Fail),
            ("h3", Reply::Fail),
            ("h4", Reply::Fail),
        ]);
        let coordinator = FanOutCoordinator::new(scorer.clone());

        let outcome = coordinator
            .place(
                &candidates(&["h1", "h2", "h3", "h4"]),
                &Resource::default(),
                TIMEOUT,
            )
            .await;

        assert_eq!(outcome.result, ResultCode::SystemError);
        assert_eq!(outcome.error.as_deref(), Some("Received no response in 200ms"));
        assert!(outcome.host_id.is_none());
        assert_eq!(scorer.calls(), 4);
    }

    #[tokio::test]
    async fn all_timed_out_is_system_error() {
        let scorer = FakeScorer::new(&[("h1", Reply::Hang), ("h2", Reply::Hang)]);
        let coordinator = FanOutCoordinator::new(scorer.clone());

        let outcome = coordinator
            .place(&candidates(&["h1", "h2"]), &Resource::default(), TIMEOUT)
            .await;

        assert_eq!(outcome.result, ResultCode::SystemError);
        assert_eq!(scorer.calls(), 2);
    }

    #[tokio::test]
    async fn late_better_score_is_ignored() {
        let scorer = FakeScorer::new(&[
            ("h1", Reply::Score(1, 1)),
            ("h2", Reply::After(2_000, 99, 99)),
        ]);
        let coordinator = FanOutCoordinator::new(scorer);

        let outcome = coordinator
            .place(&candidates(&["h1", "h2"]), &Resource::default(), TIMEOUT)
            .await;

        assert_eq!(outcome.host_id.as_deref(), Some("h1"));
    }

    #[tokio::test]
    async fn arrival_order_does_not_change_winner() {
        let scorer = FakeScorer::new(&[
            ("h1", Reply::After(80, 7, 7)),
            ("h2", Reply::Score(7, 7)),
        ]);
        let coordinator = FanOutCoordinator::new(scorer);

        let outcome = coordinator
            .place(&candidates(&["h1", "h2"]), &Resource::default(), TIMEOUT)
            .await;

        assert_eq!(outcome.host_id.as_deref(), Some("h1"));
    }

    #[test]
    fn reduce_prefers_utilization_then_transfer() {
        let cands = candidates(&["a", "b", "c"]);
        let scores: BTreeMap<HostId, Score> = [
            ("a".to_string(), Score::new(10, 5)),
            ("b".to_string(), Score::new(10, 9)),
            ("c".to_string(), Score::new(9, 100)),
        ]
        .into();

        let outcome = reduce(&cands, &scores).unwrap();
        assert_eq!(outcome.host_id.as_deref(), Some("b"));
    }

    #[test]
    fn reduce_exact_tie_is_stable() {
        let cands = candidates(&["x", "y", "z"]);
        let scores: BTreeMap<HostId, Score> = [
            ("z".to_string(), Score::new(4, 4)),
            ("y".to_string(), Score::new(4, 4)),
        ]
        .into();

        for _ in 0..10 {
            let outcome = reduce(&cands, &scores).unwrap();
            assert_eq!(outcome.host_id.as_deref(), Some("y"));
        }
    }

    #[test]
    fn reduce_without_responses_is_none() {
        assert!(reduce(&candidates(&["a"]), &BTreeMap::new()).is_none());
    }
}
