// src/ingest/mod.rs - Archive extraction and table loading
pub mod archive;
pub mod table;

use crate::models::stats_models::{PipelineStats, SkipKind};
use crate::normalize::schema::has_address_column;
use crate::utils::logging::StageLogger;
use archive::Extraction;
use table::SourceTable;

/// Loads every extracted table that passes the header probe.
pub fn load_tables(
    extraction: &Extraction,
    stats: &mut PipelineStats,
    logger: &StageLogger,
) -> Vec<SourceTable> {
    let mut loaded = Vec::with_capacity(extraction.tables.len());

    for entry in &extraction.tables {
        let headers = match table::probe_headers(&entry.path) {
            Ok(h) => h,
            Err(e) => {
                logger.log_skipped(&entry.source, &format!("{:#}", e));
                stats.record_skip(SkipKind::Extraction, entry.source.as_str(), format!("{:#}", e));
                continue;
            }
        };
        if !has_address_column(&headers) {
            logger.log_skipped(&entry.source, "no address-like column");
            stats.record_skip(SkipKind::Schema, entry.source.as_str(), "no address-like column");
            continue;
        }

        match table::load_table(&entry.path, &entry.source) {
            Ok(t) => {
                logger.log_debug(&format!("{}: {} rows", t.source, t.rows.len()));
                stats.tables_loaded += 1;
                stats.malformed_rows_skipped += t.malformed_rows;
                loaded.push(t);
            }
            Err(e) => {
                logger.log_skipped(&entry.source, &format!("{:#}", e));
                stats.record_skip(SkipKind::Extraction, entry.source.as_str(), format!("{:#}", e));
            }
        }
    }

    logger.log_data_quality_issue("malformed rows skipped", stats.malformed_rows_skipped);
    loaded
}
