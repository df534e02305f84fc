// src/ingest/archive.rs - Zip extraction with per-member failure isolation
use anyhow::{Context, Result};
use encoding_rs::EUC_KR;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;

use crate::models::stats_models::{PipelineStats, SkipKind};
use crate::utils::logging::StageLogger;

/// Member names longer than this (in bytes) are shortened.
pub const MAX_MEMBER_NAME_BYTES: usize = 100;
/// Characters of the original name kept in a shortened name.
pub const KEPT_NAME_CHARS: usize = 80;
/// Nested archives deeper than this are not opened.
pub const MAX_NESTED_DEPTH: usize = 3;

/// A delimited table found inside an archive, already on disk.
#[derive(Debug, Clone)]
pub struct ExtractedTable {
    /// `archive#member` label, nested members append `#member`.
    pub source: String,
    pub path: PathBuf,
}

/// Extraction output. The tables live inside `workdir`, which is removed
/// when this value is dropped.
pub struct Extraction {
    pub workdir: TempDir,
    pub tables: Vec<ExtractedTable>,
}

/// Member names that are not UTF-8 come from legacy Korean zip tools.
pub fn decode_member_name(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(name) => name.to_string(),
        Err(_) => {
            let (name, _) = EUC_KR.decode_without_bom_handling(raw);
            name.into_owned()
        }
    }
}

/// Shortens a file name that would exceed common filesystem limits.
pub fn safe_file_name(name: &str) -> String {
    if name.len() <= MAX_MEMBER_NAME_BYTES {
        return name.to_string();
    }
    let path = Path::new(name);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let stem = &name[..name.len() - ext.len()];
    let kept: String = stem.chars().take(KEPT_NAME_CHARS).collect();
    let digest = hex::encode(Sha256::digest(name.as_bytes()));
    format!("{}_{}{}", kept, &digest[..8], ext)
}

/// Relative path under the extraction directory, or `None` when the member
/// name would escape it.
pub fn member_relative_path(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let mut out = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => out.push(safe_file_name(&part.to_string_lossy())),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Unpacks every archive into its own `zip_<n>` directory of a private
/// temporary directory. Unreadable archives and members are recorded in
/// `stats` and skipped; only failing to create the working directory is fatal.
pub fn extract_archives(
    archives: &[PathBuf],
    stats: &mut PipelineStats,
    logger: &StageLogger,
) -> Result<Extraction> {
    let workdir = tempfile::Builder::new()
        .prefix("permit_linkage_")
        .tempdir()
        .context("creating extraction directory")?;

    let mut tables = Vec::new();
    for (i, archive) in archives.iter().enumerate() {
        let dest = workdir.path().join(format!("zip_{}", i));
        let label = display_name(archive);
        extract_one(archive, &dest, &label, 0, stats, logger, &mut tables);
    }

    logger.log_data_loaded(tables.len(), "table file");
    Ok(Extraction { workdir, tables })
}

fn extract_one(
    archive_path: &Path,
    dest: &Path,
    label: &str,
    depth: usize,
    stats: &mut PipelineStats,
    logger: &StageLogger,
    tables: &mut Vec<ExtractedTable>,
) {
    let mut archive = match File::open(archive_path)
        .map_err(anyhow::Error::from)
        .and_then(|f| zip::ZipArchive::new(f).map_err(anyhow::Error::from))
    {
        Ok(a) => a,
        Err(e) => {
            logger.log_skipped(label, &format!("unreadable archive: {}", e));
            stats.record_skip(SkipKind::Extraction, label, format!("unreadable archive: {}", e));
            return;
        }
    };
    stats.archives_opened += 1;

    if let Err(e) = fs::create_dir_all(dest) {
        stats.record_skip(SkipKind::Extraction, label, format!("cannot create {}: {}", dest.display(), e));
        return;
    }

    for index in 0..archive.len() {
        let mut member = match archive.by_index(index) {
            Ok(m) => m,
            Err(e) => {
                let source = format!("{}#<entry {}>", label, index);
                logger.log_skipped(&source, &e.to_string());
                stats.record_skip(SkipKind::Extraction, source, e.to_string());
                continue;
            }
        };
        if member.is_dir() {
            continue;
        }

        let name = decode_member_name(member.name_raw());
        let source = format!("{}#{}", label, name);
        let Some(relative) = member_relative_path(&name) else {
            logger.log_skipped(&source, "member path escapes the extraction directory");
            stats.record_skip(SkipKind::Extraction, source, "unsafe member path");
            continue;
        };

        let is_table = has_extension(&relative, "csv");
        let is_nested = has_extension(&relative, "zip");
        if !is_table && !is_nested {
            logger.log_debug(&format!("Ignoring non-table member {}", source));
            continue;
        }

        let out_path = dest.join(&relative);
        let written = out_path
            .parent()
            .map(fs::create_dir_all)
            .transpose()
            .and_then(|_| File::create(&out_path))
            .and_then(|mut out| std::io::copy(&mut member, &mut out));
        if let Err(e) = written {
            let _ = fs::remove_file(&out_path);
            logger.log_skipped(&source, &format!("extraction failed: {}", e));
            stats.record_skip(SkipKind::Extraction, source, e.to_string());
            continue;
        }

        if is_table {
            tables.push(ExtractedTable { source, path: out_path });
        } else if depth + 1 < MAX_NESTED_DEPTH {
            let nested_dest = dest.join(format!("{}_zip", relative.display()));
            extract_one(&out_path, &nested_dest, &source, depth + 1, stats, logger, tables);
        } else {
            logger.log_skipped(&source, "nested archive depth limit reached");
            stats.record_skip(SkipKind::Extraction, source, "nested archive depth limit reached");
        }
    }
}
