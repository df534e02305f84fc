// src/normalize/schema.rs - Declared column mapping for permit extracts
//
// Each canonical field lists its header patterns in priority order. A pattern
// is a set of substrings that must all occur in the (lowercased) header.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalField {
    SiteAddress,
    RoadFullAddress,
    RoadAddress,
    GenericAddress,
    BusinessName,
    BusinessType,
    StatusLabel,
    Phone,
    TotalArea,
    SiteArea,
    PermitDate,
    ClosureDate,
    ReopenDate,
    SourceLastModified,
    CoordinateX,
    CoordinateY,
}

pub struct FieldRule {
    pub field: CanonicalField,
    pub patterns: &'static [&'static [&'static str]],
}

/// Evaluated top to bottom; order is part of the contract.
pub const FIELD_RULES: &[FieldRule] = &[
    FieldRule { field: CanonicalField::SiteAddress, patterns: &[&["소재지전체주소"]] },
    FieldRule { field: CanonicalField::RoadFullAddress, patterns: &[&["도로명전체주소"]] },
    FieldRule { field: CanonicalField::RoadAddress, patterns: &[&["도로명주소"]] },
    FieldRule { field: CanonicalField::GenericAddress, patterns: &[&["주소"]] },
    FieldRule { field: CanonicalField::BusinessName, patterns: &[&["사업장명"], &["상호"]] },
    FieldRule { field: CanonicalField::BusinessType, patterns: &[&["업태구분명"], &["업태"]] },
    FieldRule { field: CanonicalField::StatusLabel, patterns: &[&["영업상태명"]] },
    FieldRule { field: CanonicalField::Phone, patterns: &[&["소재지전화"], &["전화"]] },
    FieldRule { field: CanonicalField::TotalArea, patterns: &[&["총면적"]] },
    FieldRule { field: CanonicalField::SiteArea, patterns: &[&["소재지면적"]] },
    FieldRule { field: CanonicalField::PermitDate, patterns: &[&["인허가일자"]] },
    FieldRule { field: CanonicalField::ClosureDate, patterns: &[&["폐업일자"]] },
    FieldRule { field: CanonicalField::ReopenDate, patterns: &[&["재개업일자"]] },
    FieldRule { field: CanonicalField::SourceLastModified, patterns: &[&["최종수정시점"], &["최종수정일자"]] },
    FieldRule { field: CanonicalField::CoordinateX, patterns: &[&["좌표", "x"]] },
    FieldRule { field: CanonicalField::CoordinateY, patterns: &[&["좌표", "y"]] },
];

/// Outcome of resolving one field against one header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnBinding {
    Mapped(usize),
    Unmapped,
}

impl ColumnBinding {
    pub fn index(self) -> Option<usize> {
        match self {
            ColumnBinding::Mapped(i) => Some(i),
            ColumnBinding::Unmapped => None,
        }
    }
}

/// Field → column bindings for one source table.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    bindings: Vec<(CanonicalField, ColumnBinding)>,
}

fn clean_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}

fn resolve_rule(rule: &FieldRule, headers: &[String]) -> ColumnBinding {
    for pattern in rule.patterns {
        // An exact header wins over a substring hit anywhere in the row.
        if pattern.len() == 1 {
            if let Some(i) = headers.iter().position(|h| h == pattern[0]) {
                return ColumnBinding::Mapped(i);
            }
        }
        if let Some(i) = headers
            .iter()
            .position(|h| pattern.iter().all(|part| h.contains(part)))
        {
            return ColumnBinding::Mapped(i);
        }
    }
    ColumnBinding::Unmapped
}

impl ColumnMapping {
    pub fn resolve(headers: &[String]) -> Self {
        let cleaned: Vec<String> = headers.iter().map(|h| clean_header(h)).collect();
        let bindings = FIELD_RULES
            .iter()
            .map(|rule| (rule.field, resolve_rule(rule, &cleaned)))
            .collect();
        Self { bindings }
    }

    pub fn binding(&self, field: CanonicalField) -> ColumnBinding {
        self.bindings
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, b)| *b)
            .unwrap_or(ColumnBinding::Unmapped)
    }

    /// Non-empty value of `field` in `row`.
    pub fn value<'a>(&self, field: CanonicalField, row: &'a [String]) -> Option<&'a str> {
        let idx = self.binding(field).index()?;
        row.get(idx)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
    }

    /// Address used for the identity key and for matching.
    pub fn address<'a>(&self, row: &'a [String]) -> Option<&'a str> {
        [
            CanonicalField::SiteAddress,
            CanonicalField::RoadFullAddress,
            CanonicalField::RoadAddress,
            CanonicalField::GenericAddress,
        ]
        .into_iter()
        .find_map(|field| self.value(field, row))
    }

    pub fn unmapped_fields(&self) -> Vec<CanonicalField> {
        self.bindings
            .iter()
            .filter(|(_, b)| *b == ColumnBinding::Unmapped)
            .map(|(f, _)| *f)
            .collect()
    }
}

/// Header-only probe: does any column look like an address?
pub fn has_address_column(headers: &[String]) -> bool {
    headers
        .iter()
        .any(|h| h.contains(crate::utils::constants::ADDRESS_COLUMN_MARKER))
}
