// src/territory/mod.rs - Territory assignment table
pub mod loader;
pub mod merge;

use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

use crate::errors::TerritoryLoadError;
use crate::models::records::{RosterEntry, TerritoryAssignment};
use crate::normalize::address::normalize_address;
use loader::TerritoryGrid;

pub const COL_CITY: &str = "주소시";
pub const COL_DISTRICT: &str = "주소군구";
pub const COL_DONG: &str = "주소동";
pub const COL_ADDRESS: &str = "주소";
pub const COL_BRANCH: &str = "관리지사";
pub const COL_REP: &str = "SP담당";
pub const COL_ZONE: &str = "영업구역 수정";

/// Branch names that appear without their `지사` suffix in hand-kept sheets.
const SHORT_BRANCH_NAMES: [&str; 8] = ["중앙", "강북", "서대문", "고양", "의정부", "남양주", "강릉", "원주"];

/// NFC + trim for branch and rep labels, with the canonical suffix for
/// known short branch names.
pub fn normalize_label(name: &str) -> String {
    let nfc: String = name.nfc().collect();
    let trimmed = nfc.trim();
    if SHORT_BRANCH_NAMES.contains(&trimmed) {
        format!("{}지사", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Territory rows deduplicated by normalized address, plus the manager roster.
#[derive(Debug, Clone, Default)]
pub struct TerritoryTable {
    pub assignments: Vec<TerritoryAssignment>,
    pub roster: Vec<RosterEntry>,
    /// Data rows read, before dropping unmatchable or duplicate addresses.
    pub rows_read: usize,
}

impl TerritoryTable {
    pub fn normalized_addresses(&self) -> Vec<String> {
        self.assignments
            .iter()
            .map(|a| a.normalized_address.clone())
            .collect()
    }
}

#[derive(Clone, Copy)]
enum AddressColumns {
    Components(usize, usize, usize),
    Whole(usize),
}

/// Loads and prepares the territory file. Any failure here is fatal to the
/// load and surfaces as a [`TerritoryLoadError`] inside the `anyhow::Error`.
pub fn load_territory(path: &Path) -> Result<TerritoryTable> {
    let grid = loader::read_grid(path)?;
    Ok(build_territory(&grid, path)?)
}

pub fn build_territory(grid: &TerritoryGrid, path: &Path) -> Result<TerritoryTable, TerritoryLoadError> {
    let address_columns = match (grid.column(COL_CITY), grid.column(COL_DISTRICT), grid.column(COL_DONG)) {
        (Some(c), Some(d), Some(n)) => Some(AddressColumns::Components(c, d, n)),
        _ => grid.column(COL_ADDRESS).map(AddressColumns::Whole),
    };
    let branch_col = grid.column(COL_BRANCH);
    let rep_col = grid.column(COL_REP);

    let (Some(address_columns), Some(branch_col), Some(rep_col)) = (address_columns, branch_col, rep_col) else {
        let mut missing = Vec::new();
        if grid.column(COL_ADDRESS).is_none() && grid.column(COL_CITY).is_none() {
            missing.push(format!("{} (or {}/{}/{})", COL_ADDRESS, COL_CITY, COL_DISTRICT, COL_DONG));
        }
        if branch_col.is_none() {
            missing.push(COL_BRANCH.to_string());
        }
        if rep_col.is_none() {
            missing.push(COL_REP.to_string());
        }
        if missing.is_empty() {
            missing.push(format!("{}/{}", COL_DISTRICT, COL_DONG));
        }
        return Err(TerritoryLoadError::MissingColumns {
            path: path.to_path_buf(),
            missing: missing.join(", "),
        });
    };
    let zone_col = grid.column(COL_ZONE);

    let cell = |row: &[String], idx: usize| row.get(idx).map(|v| v.trim().to_string()).unwrap_or_default();

    let mut seen = HashSet::new();
    let mut assignments = Vec::new();
    for row in &grid.rows {
        let address = match address_columns {
            AddressColumns::Components(c, d, n) => [c, d, n]
                .iter()
                .map(|&i| cell(row, i))
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            AddressColumns::Whole(i) => cell(row, i),
        };
        let address: String = address.nfc().collect();
        let Some(normalized_address) = normalize_address(&address) else {
            continue;
        };
        if !seen.insert(normalized_address.clone()) {
            continue;
        }
        assignments.push(TerritoryAssignment {
            address,
            normalized_address,
            branch: normalize_label(&cell(row, branch_col)),
            rep: normalize_label(&cell(row, rep_col)),
            zone_code: zone_col.map(|z| cell(row, z)).filter(|z| !z.is_empty()),
        });
    }

    if assignments.is_empty() {
        return Err(TerritoryLoadError::Empty { path: path.to_path_buf() });
    }

    let mut roster_seen = HashSet::new();
    let roster = assignments
        .iter()
        .map(|a| RosterEntry {
            rep: a.rep.clone(),
            zone_code: a.zone_code.clone(),
            branch: a.branch.clone(),
        })
        .filter(|entry| roster_seen.insert(entry.clone()))
        .collect();

    Ok(TerritoryTable {
        assignments,
        roster,
        rows_read: grid.rows.len(),
    })
}
