//! Referral leaderboard, recomputed from every stored registration on each call

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::registration::error::RegistrationError;
use crate::registration::registration_info::{ReferralScore, Registration};
use crate::registration::store::RegistrationStore;

pub struct ReferralAggregator {
    store: Arc<dyn RegistrationStore>,
    read_timeout: Duration,
}

impl ReferralAggregator {
    pub fn new(store: Arc<dyn RegistrationStore>, read_timeout: Duration) -> Self {
        Self {
            store,
            read_timeout,
        }
    }

    pub async fn leaderboard(&self) -> Result<Vec<ReferralScore>, RegistrationError> {
        let registrations = match tokio::time::timeout(self.read_timeout, self.store.list_all()).await
        {
            Ok(Ok(registrations)) => registrations,
            Ok(Err(e)) => {
                error!("Failed to list registrations for leaderboard: {}", e);
                return Err(RegistrationError::AggregationReadError(e.to_string()));
            }
            Err(_) => {
                error!(
                    "Listing registrations timed out after {} ms",
                    self.read_timeout.as_millis()
                );
                return Err(RegistrationError::AggregationReadError(format!(
                    "timed out after {} ms",
                    self.read_timeout.as_millis()
                )));
            }
        };

        let scores = rank_referrals(&registrations);
        debug!(
            "Leaderboard built from {} registrations: {} codes",
            registrations.len(),
            scores.len()
        );
        Ok(scores)
    }
}

/// Counts non-empty referral codes, highest count first, ties by code ascending.
pub fn rank_referrals(registrations: &[Registration]) -> Vec<ReferralScore> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for registration in registrations.iter().filter(|r| r.input.has_referral()) {
        *counts.entry(registration.input.referral_code.as_str()).or_default() += 1;
    }

    let mut scores: Vec<ReferralScore> = counts
        .into_iter()
        .map(|(code, score)| ReferralScore {
            referral_code: code.to_string(),
            score,
        })
        .collect();
    // stable sort keeps the BTreeMap's code order among equal scores
    scores.sort_by(|a, b| b.score.cmp(&a.score));
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::error::StoreError;
    use crate::registration::registration_info::{complete_input, RegistrationInput};
    use crate::registration::store::InMemoryStore;
    use async_trait::async_trait;

    fn with_codes(codes: &[&str]) -> Vec<Registration> {
        codes
            .iter()
            .enumerate()
            .map(|(i, code)| {
                let mut input = complete_input();
                input.referral_code = code.to_string();
                Registration {
                    id: format!("r-{}", i),
                    input,
                    registered_at: chrono::Utc::now(),
                }
            })
            .collect()
    }

    fn score(code: &str, score: usize) -> ReferralScore {
        ReferralScore {
            referral_code: code.to_string(),
            score,
        }
    }

    #[test]
    fn counts_and_orders_codes() {
        let board = rank_referrals(&with_codes(&["A", "A", "B", "", "A"]));
        assert_eq!(board, vec![score("A", 3), score("B", 1)]);
    }

    #[test]
    fn empty_input_gives_empty_board() {
        assert!(rank_referrals(&[]).is_empty());
        assert!(rank_referrals(&with_codes(&["", ""])).is_empty());
    }

    #[test]
    fn ties_break_by_code_ascending() {
        let board = rank_referrals(&with_codes(&["zeta", "alpha", "mid", "zeta", "alpha", "mid", "x"]));
        assert_eq!(
            board,
            vec![score("alpha", 2), score("mid", 2), score("zeta", 2), score("x", 1)]
        );
    }

    #[test]
    fn total_matches_referred_registrations() {
        let codes = ["a", "", "b", "a", "c", "", "c", "c", "b", "a", "a"];
        let board = rank_referrals(&with_codes(&codes));

        let total: usize = board.iter().map(|s| s.score).sum();
        assert_eq!(total, codes.iter().filter(|c| !c.is_empty()).count());
        assert!(board.iter().all(|s| s.score > 0 && !s.referral_code.is_empty()));
        assert!(board.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn codes_are_case_sensitive() {
        let board = rank_referrals(&with_codes(&["ld", "LD", "LD"]));
        assert_eq!(board, vec![score("LD", 2), score("ld", 1)]);
    }

    #[tokio::test]
    async fn reads_through_the_store() {
        let store = Arc::new(InMemoryStore::new());
        for code in ["A", "B", "A"] {
            let mut input = complete_input();
            input.referral_code = code.to_string();
            store.create(&input).await.unwrap();
        }

        let aggregator = ReferralAggregator::new(store, Duration::from_secs(1));
        assert_eq!(
            aggregator.leaderboard().await.unwrap(),
            vec![score("A", 2), score("B", 1)]
        );
    }

    struct BrokenStore;

    #[async_trait]
    impl RegistrationStore for BrokenStore {
        async fn create(&self, _: &RegistrationInput) -> Result<Registration, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }

        async fn list_all(&self) -> Result<Vec<Registration>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn read_failure_is_an_aggregation_error() {
        let aggregator = ReferralAggregator::new(Arc::new(BrokenStore), Duration::from_secs(1));
        let err = aggregator.leaderboard().await.unwrap_err();
        assert!(matches!(err, RegistrationError::AggregationReadError(_)));
        assert_eq!(err.user_message(), "Error fetching leaderboard");
    }
}
