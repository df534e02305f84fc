// src/utils/logging.rs - Logging helpers shared by every pipeline stage
use log::{debug, error, info, warn};
use std::time::{Duration, Instant};

use crate::models::stats_models::{PipelineStage, PipelineStats};

#[derive(Clone)]
pub struct StageLogger {
    stage_name: &'static str,
    stage_emoji: &'static str,
    start_time: Instant,
}

impl StageLogger {
    pub fn new(stage: PipelineStage) -> Self {
        Self {
            stage_name: stage.as_str(),
            stage_emoji: stage.emoji(),
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, run_id: &str) {
        info!(
            "[{}] {} 🚀 Starting {} (run ID: {})",
            self.stage_name,
            self.stage_emoji,
            self.stage_name.to_lowercase(),
            run_id
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        let msg = if let Some(details) = details {
            format!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.stage_name, self.stage_emoji, phase, details, elapsed.as_secs_f32()
            )
        } else {
            format!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.stage_name, self.stage_emoji, phase, elapsed.as_secs_f32()
            )
        };
        info!("{}", msg);
    }

    pub fn log_data_loaded(&self, count: usize, data_type: &str) {
        info!(
            "[{}] {} 📊 Loaded {} {} records",
            self.stage_name, self.stage_emoji, count, data_type
        );
    }

    pub fn log_processing_complete(&self, input_count: usize, output_count: usize) {
        info!(
            "[{}] {} ✅ Processing complete: {} in → {} out [{:.2?}]",
            self.stage_name,
            self.stage_emoji,
            input_count,
            output_count,
            self.start_time.elapsed()
        );
    }

    pub fn log_skipped(&self, what: &str, reason: &str) {
        warn!(
            "[{}] {} ⏭️  Skipping {}: {}",
            self.stage_name, self.stage_emoji, what, reason
        );
    }

    pub fn log_data_quality_issue(&self, issue_type: &str, count: usize) {
        if count > 0 {
            warn!(
                "[{}] {} ⚠️  Data quality: {} instances of {}",
                self.stage_name, self.stage_emoji, count, issue_type
            );
        }
    }

    pub fn log_progress_update(&self, current: usize, total: usize, additional_info: Option<&str>) {
        // Every 50 items, plus every 10% on larger batches
        let should_log = current % 50 == 0
            || current == total
            || (total >= 100 && current % (total / 10) == 0);

        if should_log && current > 0 {
            let percent = (current as f64 / total as f64) * 100.0;
            let msg = match additional_info {
                Some(info) => format!("Progress: {}/{} ({:.1}%) - {}", current, total, percent, info),
                None => format!("Progress: {}/{} ({:.1}%)", current, total, percent),
            };
            info!("[{}] {} 📊 {}", self.stage_name, self.stage_emoji, msg);
        }
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.stage_name, self.stage_emoji, message);
    }

    pub fn log_error(&self, message: &str) {
        error!("[{}] {} ❌ {}", self.stage_name, self.stage_emoji, message);
    }

    pub fn log_debug(&self, message: &str) {
        debug!("[{}] {} {}", self.stage_name, self.stage_emoji, message);
    }
}

pub fn log_pipeline_start(run_id: &str, archive_count: usize, territory: &str) {
    info!("🚀 ===== PERMIT LINKAGE PIPELINE STARTING =====");
    info!("📅 Pipeline Run ID: {}", run_id);
    info!("   • {} archive(s) queued", archive_count);
    info!("   • Territory table: {}", territory);
    info!("================================================");
}

pub fn log_pipeline_completion(stats: &PipelineStats, duration: Duration, show_memory: bool) {
    info!("🎉 ===== PERMIT LINKAGE PIPELINE COMPLETED =====");
    info!("📅 Pipeline Run ID: {}", stats.run_id);
    info!("⏱️  Total Duration: {:.2?}", duration);
    if stats.served_from_cache {
        info!("💾 Resolved base served from cache");
    }
    info!("📦 Tables: {} loaded, {} skipped (schema), {} members skipped (extraction)",
        stats.tables_loaded, stats.tables_skipped_schema, stats.members_skipped_extraction);
    info!("🧹 Rows: {} before dedup → {} after ({} collapsed in {} collision groups)",
        stats.rows_before_dedup, stats.rows_after_dedup, stats.duplicates_collapsed, stats.collision_groups);
    info!("🌍 Coordinates: {} passthrough, {} converted, {} nulled, {} missing",
        stats.coordinates_passthrough, stats.coordinates_converted, stats.coordinates_nulled, stats.coordinates_missing);
    info!("📍 Matching: {} matched, {} unassigned ({} no address, {} below threshold, {} geo guard)",
        stats.matched,
        stats.unassigned_total(),
        stats.unassigned_no_address,
        stats.unassigned_below_threshold,
        stats.unassigned_geo_guard);
    info!("📝 Overlay: {} entries loaded, {} applied", stats.overlay_entries, stats.overlay_applied);
    if stats.last_modified_sentinel > 0 {
        warn!("⚠️  {} records have no business date; last-modified defaulted to ingestion time",
            stats.last_modified_sentinel);
    }
    if show_memory {
        info!("🧠 Memory usage: {} MB", super::get_memory_usage());
    }
    info!("===============================================");
}
