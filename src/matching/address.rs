// src/matching/address.rs - Business address → territory address matching
use indicatif::ProgressBar;
use strsim::normalized_levenshtein;

use super::tfidf::{best_candidate, top_candidates, SparseVector, TfidfIndex};
use crate::config::MatcherConfig;
use crate::models::records::{MatchMethod, UnassignedReason};
use crate::normalize::address::shares_geo_token;

/// A cosine score at or above this is accepted without edit-ratio refinement.
pub const TRUSTED_COSINE: f64 = 0.85;

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched {
        /// Index into the territory corpus.
        candidate: usize,
        score: f64,
        method: MatchMethod,
    },
    Unassigned(UnassignedReason),
}

/// Territory corpus fitted once per load and reused for every query.
pub struct AddressMatcher {
    addresses: Vec<String>,
    index: TfidfIndex,
    config: MatcherConfig,
}

impl AddressMatcher {
    /// `addresses` must already be normalized and deduplicated.
    pub fn new(addresses: Vec<String>, config: MatcherConfig) -> Self {
        let index = TfidfIndex::build(&addresses);
        Self { addresses, index, config }
    }

    pub fn corpus_len(&self) -> usize {
        self.addresses.len()
    }

    /// Matches every query, in order. `None` queries have no usable address.
    /// Results do not depend on `chunk_size`.
    pub fn match_all(&self, queries: &[Option<String>], progress: Option<&ProgressBar>) -> Vec<MatchOutcome> {
        let chunk_size = self.config.chunk_size.max(1);
        let mut outcomes = Vec::with_capacity(queries.len());

        for chunk in queries.chunks(chunk_size) {
            let vectors: Vec<SparseVector> = chunk
                .iter()
                .map(|q| q.as_deref().map(|q| self.index.vectorize(q)).unwrap_or_default())
                .collect();
            let scores = self.index.score_block(&vectors);

            for (row, query) in chunk.iter().enumerate() {
                let outcome = match query {
                    None => MatchOutcome::Unassigned(UnassignedReason::NoAddress),
                    Some(q) => self.decide(q, scores.row(row)),
                };
                outcomes.push(outcome);
            }
            if let Some(pb) = progress {
                pb.inc(chunk.len() as u64);
            }
        }
        outcomes
    }

    fn decide(&self, query: &str, row: ndarray::ArrayView1<f64>) -> MatchOutcome {
        let Some((mut candidate, cosine)) = best_candidate(row) else {
            return MatchOutcome::Unassigned(UnassignedReason::BelowThreshold);
        };
        let mut score = cosine;
        let mut method = MatchMethod::Cosine;

        if self.config.refine_enabled && cosine < TRUSTED_COSINE {
            for (idx, cos) in top_candidates(row, self.config.refine_top_n) {
                let edit = normalized_levenshtein(query, &self.addresses[idx]);
                let combined = cos.max(edit);
                if combined > score {
                    candidate = idx;
                    score = combined;
                    method = if edit > cos { MatchMethod::EditRatio } else { MatchMethod::Cosine };
                }
            }
        }

        if score < self.config.threshold || score <= 0.0 {
            return MatchOutcome::Unassigned(UnassignedReason::BelowThreshold);
        }
        if !shares_geo_token(query, &self.addresses[candidate]) {
            return MatchOutcome::Unassigned(UnassignedReason::GeoGuardRejected);
        }
        MatchOutcome::Matched { candidate, score, method }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        [
            "서울 강남구 역삼동 123",
            "서울 강남구 삼성동 45",
            "서울 중구 명동2가 10",
            "부산 해운대구 우동 1400",
            "경기 고양시 일산동구 장항동 800",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn config(threshold: f64, chunk_size: usize) -> MatcherConfig {
        MatcherConfig {
            threshold,
            chunk_size,
            ..MatcherConfig::default()
        }
    }

    fn queries() -> Vec<Option<String>> {
        [
            Some("서울 강남구 역삼동 123"),
            Some("서울 강남구 역삼동 125"),
            None,
            Some("부산 해운대구 우동 1401"),
            Some("경기 성남시 분당구 정자동 1"),
            Some("서울 중구 명동2가 10"),
            Some("제주 제주시 연동 1"),
        ]
        .into_iter()
        .map(|q| q.map(str::to_string))
        .collect()
    }

    #[test]
    fn test_exact_address_matches() {
        let matcher = AddressMatcher::new(corpus(), config(0.5, 1000));
        let out = matcher.match_all(&[Some("서울 강남구 역삼동 123".to_string())], None);
        match &out[0] {
            MatchOutcome::Matched { candidate, score, method } => {
                assert_eq!(*candidate, 0);
                assert!(*score > 0.999);
                assert_eq!(*method, MatchMethod::Cosine);
            }
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn test_chunk_size_does_not_change_results() {
        let qs = queries();
        let reference = AddressMatcher::new(corpus(), config(0.5, 1000)).match_all(&qs, None);
        for chunk_size in [1, 2, 3, 7] {
            let out = AddressMatcher::new(corpus(), config(0.5, chunk_size)).match_all(&qs, None);
            assert_eq!(out, reference, "chunk size {}", chunk_size);
        }
    }

    #[test]
    fn test_missing_address_is_unassigned() {
        let matcher = AddressMatcher::new(corpus(), config(0.5, 10));
        let out = matcher.match_all(&[None], None);
        assert_eq!(out[0], MatchOutcome::Unassigned(UnassignedReason::NoAddress));
    }

    #[test]
    fn test_same_dong_in_other_city_is_rejected() {
        let corpus = vec!["서울 강남구 역삼동 123".to_string()];
        // Low threshold so the geography guard, not the cutoff, decides.
        let matcher = AddressMatcher::new(corpus, config(0.1, 10));
        let out = matcher.match_all(&[Some("경기 성남시 역삼동 123".to_string())], None);
        assert_eq!(out[0], MatchOutcome::Unassigned(UnassignedReason::GeoGuardRejected));
    }

    #[test]
    fn test_unrelated_address_below_threshold() {
        let matcher = AddressMatcher::new(corpus(), config(0.5, 10));
        let out = matcher.match_all(&[Some("제주 제주시 연동 1".to_string())], None);
        assert_eq!(out[0], MatchOutcome::Unassigned(UnassignedReason::BelowThreshold));
    }

    fn refining(threshold: f64) -> MatcherConfig {
        MatcherConfig {
            refine_enabled: true,
            ..config(threshold, 100)
        }
    }

    #[test]
    fn test_edit_ratio_lifts_typo_over_threshold() {
        let corpus = vec!["서울 강남구 역삼동 123".to_string()];
        // Two scattered typos break many n-grams but few characters.
        let query = "서울 강북구 역삼동 193".to_string();
        let edit = normalized_levenshtein(&query, &corpus[0]);

        let baseline = AddressMatcher::new(corpus.clone(), config(0.0, 10)).match_all(&[Some(query.clone())], None);
        let cosine = match &baseline[0] {
            MatchOutcome::Matched { score, method, .. } => {
                assert_eq!(*method, MatchMethod::Cosine);
                *score
            }
            other => panic!("expected a cosine match, got {:?}", other),
        };
        assert!(cosine < TRUSTED_COSINE);
        assert!(edit > cosine, "edit {} cosine {}", edit, cosine);

        let threshold = (cosine + edit) / 2.0;
        let plain = AddressMatcher::new(corpus.clone(), config(threshold, 10)).match_all(&[Some(query.clone())], None);
        assert_eq!(plain[0], MatchOutcome::Unassigned(UnassignedReason::BelowThreshold));

        let refined = AddressMatcher::new(corpus, refining(threshold)).match_all(&[Some(query)], None);
        match &refined[0] {
            MatchOutcome::Matched { candidate, score, method } => {
                assert_eq!(*candidate, 0);
                assert_eq!(*method, MatchMethod::EditRatio);
                assert!((score - edit).abs() < 1e-12);
            }
            other => panic!("expected an edit-ratio match, got {:?}", other),
        }
    }

    #[test]
    fn test_trusted_cosine_skips_refinement() {
        let corpus = vec!["서울 강남구 역삼동 123".to_string(), "서울 강남구 역삼동 124".to_string()];
        let matcher = AddressMatcher::new(corpus, refining(0.5));
        let query = "서울 강남구 역삼동 124";

        // Candidate 1 is an exact string match, but a trusted cosine on
        // candidate 0 is kept as-is.
        let trusted = matcher.decide(query, ndarray::arr1(&[TRUSTED_COSINE, 0.2]).view());
        assert_eq!(
            trusted,
            MatchOutcome::Matched { candidate: 0, score: TRUSTED_COSINE, method: MatchMethod::Cosine }
        );

        let untrusted = matcher.decide(query, ndarray::arr1(&[0.8, 0.2]).view());
        assert_eq!(
            untrusted,
            MatchOutcome::Matched { candidate: 1, score: 1.0, method: MatchMethod::EditRatio }
        );
    }

    #[test]
    fn test_refined_candidate_still_faces_geo_guard() {
        // Candidate 1 is closer by edit distance but sits under misspelled
        // city/district tokens.
        let corpus = vec!["서울 강남구 삼성동 45".to_string(), "서을 강낭구 역삼동 123".to_string()];
        let query = "서울 강남구 역삼동 123";
        let row = ndarray::arr1(&[0.6, 0.3]);

        let plain = AddressMatcher::new(corpus.clone(), config(0.5, 10));
        assert!(matches!(
            plain.decide(query, row.view()),
            MatchOutcome::Matched { candidate: 0, method: MatchMethod::Cosine, .. }
        ));

        let refined = AddressMatcher::new(corpus, refining(0.5));
        assert_eq!(
            refined.decide(query, row.view()),
            MatchOutcome::Unassigned(UnassignedReason::GeoGuardRejected)
        );
    }

    #[test]
    fn test_refinement_never_lowers_score() {
        let qs = queries();
        let plain = AddressMatcher::new(corpus(), config(0.0, 100)).match_all(&qs, None);
        let refined_config = MatcherConfig {
            refine_enabled: true,
            ..config(0.0, 100)
        };
        let refined = AddressMatcher::new(corpus(), refined_config).match_all(&qs, None);
        for (p, r) in plain.iter().zip(&refined) {
            if let (MatchOutcome::Matched { score: ps, .. }, MatchOutcome::Matched { score: rs, .. }) = (p, r) {
                assert!(rs >= ps);
            }
        }
    }
}
