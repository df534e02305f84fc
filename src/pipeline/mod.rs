// src/pipeline/mod.rs - One batch load, end to end
pub mod cache;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::dedup::deduplicate;
use crate::derive::{derive_areas, derive_last_modified};
use crate::geo::resolve_coordinates;
use crate::ingest::{archive::extract_archives, load_tables};
use crate::matching::AddressMatcher;
use crate::models::records::{ResolvedBusinessRecord, RosterEntry};
use crate::models::stats_models::{PipelineStage, PipelineStats};
use crate::normalize::{normalize_address, normalize_table};
use crate::overlay::{merge_overlay, StatusOverlay, StatusOverlayStore};
use crate::territory::{load_territory, merge::merge_assignments};
use crate::utils::env::now_kst;
use crate::utils::logging::{log_pipeline_completion, log_pipeline_start, StageLogger};
use crate::utils::progress_config::{add_bar, ProgressConfig};
use cache::{CacheKey, ResolutionCache, ResolvedBase};

const STAGE_COUNT: u64 = 8;

#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub archives: Vec<PathBuf>,
    pub territory: PathBuf,
}

/// The resolved table handed to presentation layers.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedDataset {
    pub records: Vec<ResolvedBusinessRecord>,
    pub roster: Vec<RosterEntry>,
    pub stats: PipelineStats,
}

pub struct Pipeline<S: StatusOverlayStore> {
    config: PipelineConfig,
    progress: ProgressConfig,
    store: S,
    cache: ResolutionCache,
}

impl<S: StatusOverlayStore> Pipeline<S> {
    pub fn new(config: PipelineConfig, progress: ProgressConfig, store: S) -> Self {
        let cache = ResolutionCache::new(config.cache_capacity);
        Self {
            config,
            progress,
            store,
            cache,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one load. Only a territory failure (or failing to create the
    /// working directory) is an error; every other per-file or per-row
    /// problem is counted in the returned stats.
    pub fn run(&mut self, input: &PipelineInput) -> Result<ResolvedDataset> {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        log_pipeline_start(&run_id, input.archives.len(), &input.territory.display().to_string());

        let key = CacheKey::for_inputs(&input.archives, &input.territory)?;
        let base = match self.cache.get(&key) {
            Some(mut base) => {
                info!("💾 Reusing resolved base for unchanged inputs");
                base.stats.served_from_cache = true;
                base
            }
            None => {
                let base = self.resolve_base(input, &run_id)?;
                self.cache.put(key, base.clone());
                base
            }
        };

        let ResolvedBase { mut records, roster, mut stats } = base;
        stats.run_id = run_id.clone();

        let overlay_logger = StageLogger::new(PipelineStage::Overlay);
        overlay_logger.log_start(&run_id);
        let overlay = self.load_overlay(&overlay_logger);
        merge_overlay(&mut records, &overlay, &mut stats);
        derive_last_modified(&mut records, now_kst(), &mut stats);
        overlay_logger.log_processing_complete(stats.overlay_entries, stats.overlay_applied);

        log_pipeline_completion(&stats, started.elapsed(), self.progress.should_show_memory());
        Ok(ResolvedDataset { records, roster, stats })
    }

    fn load_overlay(&self, logger: &StageLogger) -> StatusOverlay {
        match self.store.get_all() {
            Ok(overlay) => {
                logger.log_data_loaded(overlay.len(), "overlay");
                overlay
            }
            Err(e) => {
                logger.log_warning(&format!("Status overlay unavailable, using raw status labels: {:#}", e));
                StatusOverlay::new()
            }
        }
    }

    /// Everything up to and including area derivation.
    fn resolve_base(&self, input: &PipelineInput, run_id: &str) -> Result<ResolvedBase> {
        let mut stats = PipelineStats {
            run_id: run_id.to_string(),
            ..Default::default()
        };
        let multi = self.progress.create_multi_progress();
        let stage_bar = add_bar(
            multi.as_ref(),
            STAGE_COUNT,
            "  {spinner:.green} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}",
        );
        let advance = |bar: &Option<ProgressBar>, msg: &'static str| {
            if let Some(pb) = bar {
                pb.inc(1);
                pb.set_message(msg);
            }
        };

        // The territory table is the one fatal dependency; load it first.
        let territory_logger = StageLogger::new(PipelineStage::Territory);
        territory_logger.log_start(run_id);
        let territory = load_territory(&input.territory)
            .map_err(|e| {
                territory_logger.log_error(&format!("{:#}", e));
                e
            })
            .with_context(|| format!("loading territory table {}", input.territory.display()))?;
        stats.territory_rows = territory.rows_read;
        stats.territory_unique_addresses = territory.assignments.len();
        territory_logger.log_processing_complete(territory.rows_read, territory.assignments.len());
        advance(&stage_bar, "territory loaded");

        let extract_logger = StageLogger::new(PipelineStage::Extract);
        extract_logger.log_start(run_id);
        let extraction = extract_archives(&input.archives, &mut stats, &extract_logger)?;
        let tables = load_tables(&extraction, &mut stats, &extract_logger);
        extract_logger.log_processing_complete(extraction.tables.len(), tables.len());
        advance(&stage_bar, "archives extracted");

        let normalize_logger = StageLogger::new(PipelineStage::Normalize);
        normalize_logger.log_start(run_id);
        let mut rows = Vec::new();
        for (i, table) in tables.iter().enumerate() {
            rows.extend(normalize_table(table, &normalize_logger));
            normalize_logger.log_progress_update(i + 1, tables.len(), Some(&table.source));
        }
        normalize_logger.log_processing_complete(tables.len(), rows.len());
        drop(tables);
        drop(extraction);
        advance(&stage_bar, "rows normalized");

        let dedup_logger = StageLogger::new(PipelineStage::Dedup);
        dedup_logger.log_start(run_id);
        let deduped = deduplicate(rows, self.config.duplicate_policy, &mut stats, &dedup_logger);
        advance(&stage_bar, "deduplicated");

        let coords_logger = StageLogger::new(PipelineStage::Coordinates);
        coords_logger.log_start(run_id);
        let coordinates = resolve_coordinates(&deduped.records, &mut stats, &coords_logger);
        advance(&stage_bar, "coordinates resolved");

        let match_logger = StageLogger::new(PipelineStage::Match);
        match_logger.log_start(run_id);
        let normalized: Vec<Option<String>> = deduped
            .records
            .iter()
            .map(|r| normalize_address(&r.address))
            .collect();
        let matcher = AddressMatcher::new(territory.normalized_addresses(), self.config.matcher.clone());
        match_logger.log_phase(
            "Fitted TF-IDF corpus",
            Some(&format!("{} territory addresses", matcher.corpus_len())),
        );
        let match_bar = if self.progress.should_show_detailed() {
            add_bar(
                multi.as_ref(),
                normalized.len() as u64,
                "    {spinner:.blue} [{elapsed_precise}] {bar:30.green/white} {pos}/{len} addresses matched",
            )
        } else {
            None
        };
        let outcomes = matcher.match_all(&normalized, match_bar.as_ref());
        if let Some(pb) = &match_bar {
            pb.finish_and_clear();
        }
        advance(&stage_bar, "addresses matched");

        let merge_logger = StageLogger::new(PipelineStage::Merge);
        merge_logger.log_start(run_id);
        let mut records = merge_assignments(
            deduped.records,
            normalized,
            coordinates,
            outcomes,
            &territory,
            &deduped.review_keys,
            &mut stats,
        );
        merge_logger.log_data_quality_issue("records without a usable address", stats.unassigned_no_address);
        merge_logger.log_data_quality_issue("matches rejected by the geography guard", stats.unassigned_geo_guard);
        merge_logger.log_processing_complete(records.len(), stats.matched);
        advance(&stage_bar, "assignments merged");

        derive_areas(&mut records);
        advance(&stage_bar, "areas derived");
        if let Some(pb) = &stage_bar {
            pb.finish_with_message("resolved");
        }

        if stats.tables_loaded == 0 && !input.archives.is_empty() {
            warn!("No usable tables found in {} archive(s)", input.archives.len());
        }

        Ok(ResolvedBase {
            records,
            roster: territory.roster,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TerritoryLoadError;
    use crate::normalize::identity_key;
    use crate::overlay::JsonFileStatusStore;
    use crate::utils::constants::UNASSIGNED;
    use encoding_rs::EUC_KR;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use zip::write::SimpleFileOptions;

    const HEADER: &str = "번호,사업장명,소재지전체주소,도로명전체주소,영업상태명,인허가일자,폐업일자,소재지면적,총면적,좌표정보(X),좌표정보(Y)";

    fn write_cp949_zip(path: &Path, members: &[(&str, String)]) {
        let mut zw = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, text) in members {
            let (bytes, _, _) = EUC_KR.encode(text);
            zw.start_file(*name, SimpleFileOptions::default()).unwrap();
            zw.write_all(&bytes).unwrap();
        }
        zw.finish().unwrap();
    }

    struct Fixture {
        dir: tempfile::TempDir,
        input: PipelineInput,
    }

    impl Fixture {
        fn overlay_path(&self) -> PathBuf {
            self.dir.path().join("store").join("activity_status.json")
        }

        fn pipeline(&self) -> Pipeline<JsonFileStatusStore> {
            let config = PipelineConfig {
                overlay_path: self.overlay_path(),
                ..PipelineConfig::default()
            };
            let store = JsonFileStatusStore::new(self.overlay_path());
            Pipeline::new(config, ProgressConfig::disabled(), store)
        }
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();

        let territory = dir.path().join("territory.csv");
        std::fs::write(
            &territory,
            "주소,관리지사,SP담당,영업구역 수정\n서울 강남구 역삼동 123,중앙,김,A1\n부산 해운대구 우동 1400,강북,이,\n",
        )
        .unwrap();

        let permits = [
            HEADER.to_string(),
            "1,카페 A,서울특별시 강남구 역삼동 123,서울특별시 강남구 테헤란로 1,영업/정상,20200101,,0,99.17,202000.5,445000.25".into(),
            "2,미용실 B,경기도 성남시 분당구 정자동 1,,폐업,20150301,20230630,33.058,,127.1,37.36".into(),
            "3,마스킹,서울 강남구 ***,,영업/정상,,,,,,".into(),
            "4,깨진행".into(),
        ]
        .join("\n");
        let overlapping = [
            HEADER.to_string(),
            "1,카페A,서울시 강남구 역삼동 123,,영업/정상,20200101,,0,99.17,,".into(),
        ]
        .join("\n");

        let first = dir.path().join("permits_2024.zip");
        write_cp949_zip(
            &first,
            &[
                ("일반음식점.csv", permits),
                ("설명.csv", "번호,항목\n1,설명\n".to_string()),
            ],
        );
        let second = dir.path().join("permits_2025.zip");
        write_cp949_zip(&second, &[("일반음식점.csv", overlapping)]);

        Fixture {
            input: PipelineInput {
                archives: vec![first, second],
                territory,
            },
            dir,
        }
    }

    fn by_name<'a>(dataset: &'a ResolvedDataset, name: &str) -> &'a ResolvedBusinessRecord {
        dataset
            .records
            .iter()
            .find(|r| r.business_name == name)
            .unwrap_or_else(|| panic!("{} missing", name))
    }

    #[test]
    fn test_end_to_end_assignment_and_area() {
        let fx = fixture();
        let dataset = fx.pipeline().run(&fx.input).unwrap();

        assert_eq!(dataset.stats.tables_loaded, 2);
        assert_eq!(dataset.stats.tables_skipped_schema, 1);
        assert_eq!(dataset.stats.malformed_rows_skipped, 1);
        assert_eq!(dataset.stats.rows_before_dedup, 4);
        assert_eq!(dataset.stats.rows_after_dedup, 3);
        assert_eq!(dataset.records.len(), 3);

        let cafe = by_name(&dataset, "카페 A");
        assert_eq!(cafe.identity_key, identity_key("카페 A", "서울특별시 강남구 역삼동 123"));
        assert_eq!(cafe.branch, "중앙지사");
        assert_eq!(cafe.rep, "김");
        assert_eq!(cafe.zone_code, "A1");
        assert_eq!(cafe.area_pyeong, 30.0);
        assert_eq!(cafe.activity_status, "영업/정상");
        assert!(cafe.latitude.is_some());

        let salon = by_name(&dataset, "미용실 B");
        assert_eq!(salon.branch, UNASSIGNED);
        assert_eq!(salon.rep, UNASSIGNED);
        assert_eq!(salon.area_pyeong, 10.0);
        assert_eq!(salon.latitude, Some(37.36));
        assert_eq!(
            salon.last_modified,
            chrono::NaiveDate::from_ymd_opt(2023, 6, 30).and_then(|d| d.and_hms_opt(0, 0, 0))
        );

        let masked = by_name(&dataset, "마스킹");
        assert_eq!(masked.branch, UNASSIGNED);
        assert_eq!(
            masked.unassigned_reason,
            Some(crate::models::records::UnassignedReason::NoAddress)
        );
        assert!(masked.last_modified_is_ingestion_time);

        assert_eq!(dataset.roster.len(), 2);
    }

    #[test]
    fn test_rerun_is_idempotent_and_cached() {
        let fx = fixture();
        let mut pipeline = fx.pipeline();
        let first = pipeline.run(&fx.input).unwrap();
        let second = pipeline.run(&fx.input).unwrap();

        assert!(!first.stats.served_from_cache);
        assert!(second.stats.served_from_cache);
        assert_eq!(first.records.len(), second.records.len());
        for (a, b) in first.records.iter().zip(&second.records) {
            if a.last_modified_is_ingestion_time {
                let mut b = b.clone();
                b.last_modified = a.last_modified;
                assert_eq!(*a, b);
            } else {
                assert_eq!(a, b);
            }
        }

        let fresh = fx.pipeline().run(&fx.input).unwrap();
        assert_eq!(
            fresh.records.iter().map(|r| &r.identity_key).collect::<Vec<_>>(),
            first.records.iter().map(|r| &r.identity_key).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_overlay_takes_precedence_over_raw_status() {
        let fx = fixture();
        let mut pipeline = fx.pipeline();
        let before = pipeline.run(&fx.input).unwrap();
        assert_eq!(by_name(&before, "카페 A").activity_status, "영업/정상");

        // Writer side computes the key from the same inputs.
        let key = identity_key("카페 A", "서울특별시 강남구 역삼동 123");
        let changed_at = chrono::NaiveDate::from_ymd_opt(2025, 1, 2)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .unwrap();
        pipeline.store().set(&key, "상담중", "사장님 부재", "김", changed_at).unwrap();

        let after = pipeline.run(&fx.input).unwrap();
        assert!(after.stats.served_from_cache);
        let cafe = by_name(&after, "카페 A");
        assert_eq!(cafe.activity_status, "🟡 상담중");
        assert_eq!(cafe.notes, "사장님 부재");
        assert_eq!(cafe.status_changed_by.as_deref(), Some("김"));
        assert_eq!(cafe.last_modified, Some(changed_at));
        assert_eq!(after.stats.overlay_applied, 1);
        assert_eq!(by_name(&after, "미용실 B").activity_status, "폐업");
    }

    #[test]
    fn test_corrupt_overlay_is_read_but_not_touched() {
        let fx = fixture();
        let path = fx.overlay_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ half written").unwrap();

        let dataset = fx.pipeline().run(&fx.input).unwrap();
        assert_eq!(dataset.stats.overlay_entries, 0);
        assert_eq!(by_name(&dataset, "카페 A").activity_status, "영업/정상");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ half written");
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_territory_failure_is_fatal() {
        let fx = fixture();
        let input = PipelineInput {
            territory: fx.dir.path().join("missing.xlsx"),
            ..fx.input.clone()
        };
        let err = fx.pipeline().run(&input).unwrap_err();
        assert!(err.downcast_ref::<TerritoryLoadError>().is_some());

        let bad = fx.dir.path().join("bad_territory.csv");
        std::fs::write(&bad, "주소,담당\n서울 강남구 역삼동 123,김\n").unwrap();
        let input = PipelineInput { territory: bad, ..fx.input.clone() };
        let err = fx.pipeline().run(&input).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TerritoryLoadError>(),
            Some(TerritoryLoadError::MissingColumns { .. })
        ));
    }

    #[test]
    fn test_corrupt_archive_does_not_abort() {
        let fx = fixture();
        let broken = fx.dir.path().join("broken.zip");
        std::fs::write(&broken, b"PK\x03\x04 truncated").unwrap();
        let mut archives = vec![broken];
        archives.extend(fx.input.archives.iter().cloned());
        let input = PipelineInput { archives, ..fx.input.clone() };

        let dataset = fx.pipeline().run(&input).unwrap();
        assert_eq!(dataset.records.len(), 3);
        assert_eq!(dataset.stats.members_skipped_extraction, 1);
    }

    #[test]
    fn test_no_archives_yields_empty_dataset() {
        let fx = fixture();
        let input = PipelineInput { archives: Vec::new(), ..fx.input.clone() };
        let dataset = fx.pipeline().run(&input).unwrap();
        assert!(dataset.records.is_empty());
        assert_eq!(dataset.roster.len(), 2);
    }
}
