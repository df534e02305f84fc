// src/dedup.rs - Identity-key deduplication across overlapping extracts
use std::collections::{HashMap, HashSet};

use crate::config::DuplicatePolicy;
use crate::models::records::RawPermitRecord;
use crate::models::stats_models::PipelineStats;
use crate::utils::logging::StageLogger;

/// Key produced when both name and address are empty.
pub const DEGENERATE_KEY: &str = "_";

#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Survivors in first-seen order.
    pub records: Vec<RawPermitRecord>,
    /// Keys whose survivor must be flagged for review under
    /// [`DuplicatePolicy::FlagForReview`].
    pub review_keys: HashSet<String>,
}

/// Collapses rows with equal identity keys, keeping the first occurrence.
pub fn deduplicate(
    rows: Vec<RawPermitRecord>,
    policy: DuplicatePolicy,
    stats: &mut PipelineStats,
    logger: &StageLogger,
) -> DedupOutcome {
    stats.rows_before_dedup = rows.len();

    let mut seen: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        if row.identity_key == DEGENERATE_KEY {
            stats.degenerate_keys += 1;
        }
        match seen.get_mut(&row.identity_key) {
            Some(count) => *count += 1,
            None => {
                seen.insert(row.identity_key.clone(), 1);
                records.push(row);
            }
        }
    }

    let collided: Vec<&String> = seen.iter().filter(|(_, n)| **n > 1).map(|(k, _)| k).collect();
    stats.rows_after_dedup = records.len();
    stats.duplicates_collapsed = stats.rows_before_dedup - stats.rows_after_dedup;
    stats.collision_groups = collided.len();

    let review_keys = match policy {
        DuplicatePolicy::KeepFirst => HashSet::new(),
        DuplicatePolicy::FlagForReview => collided.into_iter().cloned().collect(),
    };

    logger.log_data_quality_issue("rows with empty name and address", stats.degenerate_keys);
    logger.log_processing_complete(stats.rows_before_dedup, stats.rows_after_dedup);
    DedupOutcome { records, review_keys }
}
