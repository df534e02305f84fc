// src/normalize/record.rs - Source rows → RawPermitRecord
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::address::identity_key;
use super::schema::{CanonicalField, ColumnMapping};
use crate::ingest::table::SourceTable;
use crate::models::records::RawPermitRecord;
use crate::utils::logging::StageLogger;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y%m%d", "%Y.%m.%d", "%Y/%m/%d"];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// Parses a date token in any of the accepted forms. Unparseable input is
/// `None`, never an error.
pub fn parse_date_lenient(value: &str) -> Option<NaiveDate> {
    parse_datetime_lenient(value).map(|dt| dt.date())
}

pub fn parse_datetime_lenient(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim().trim_end_matches(".0");
    if trimmed.is_empty() {
        return None;
    }
    let mut parts = trimmed.splitn(2, |c: char| c == ' ' || c == 'T');
    let date_part = parts.next()?;
    let time_part = parts.next().map(str::trim);

    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())?;

    let time = match time_part {
        Some(t) if !t.is_empty() => TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(t, fmt).ok())?,
        _ => NaiveTime::from_hms_opt(0, 0, 0)?,
    };
    Some(date.and_time(time))
}

/// Numeric cell; thousands separators are tolerated.
pub fn parse_number_lenient(value: &str) -> Option<f64> {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn owned(mapping: &ColumnMapping, field: CanonicalField, row: &[String]) -> Option<String> {
    mapping.value(field, row).map(str::to_string)
}

/// Normalizes every row of `table`, computing the identity key as it goes.
pub fn normalize_table(table: &SourceTable, logger: &StageLogger) -> Vec<RawPermitRecord> {
    let mapping = ColumnMapping::resolve(&table.headers);
    let unmapped = mapping.unmapped_fields();
    if !unmapped.is_empty() {
        logger.log_debug(&format!("{}: no column for {:?}", table.source, unmapped));
    }
    table
        .rows
        .iter()
        .map(|row| normalize_row(&mapping, row, &table.source))
        .collect()
}

pub fn normalize_row(mapping: &ColumnMapping, row: &[String], source: &str) -> RawPermitRecord {
    use CanonicalField::*;

    let business_name = owned(mapping, BusinessName, row).unwrap_or_default();
    let address = mapping.address(row).unwrap_or_default().to_string();
    let number = |field| mapping.value(field, row).and_then(parse_number_lenient);
    let date = |field| mapping.value(field, row).and_then(parse_date_lenient);

    RawPermitRecord {
        identity_key: identity_key(&business_name, &address),
        source: source.to_string(),
        road_address: owned(mapping, RoadFullAddress, row).or_else(|| owned(mapping, RoadAddress, row)),
        phone: owned(mapping, Phone, row),
        business_type: owned(mapping, BusinessType, row),
        status_label: owned(mapping, StatusLabel, row),
        site_area: number(SiteArea),
        total_area: number(TotalArea),
        permit_date: date(PermitDate),
        closure_date: date(ClosureDate),
        reopen_date: date(ReopenDate),
        source_last_modified: mapping
            .value(SourceLastModified, row)
            .and_then(parse_datetime_lenient),
        raw_x: number(CoordinateX),
        raw_y: number(CoordinateY),
        business_name,
        address,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_lenient_dates() {
        let d = NaiveDate::from_ymd_opt(2023, 4, 5).unwrap();
        assert_eq!(parse_date_lenient("2023-04-05"), Some(d));
        assert_eq!(parse_date_lenient("20230405"), Some(d));
        assert_eq!(parse_date_lenient("2023.04.05"), Some(d));
        assert_eq!(parse_date_lenient("2023/04/05"), Some(d));
        assert_eq!(parse_date_lenient(" 2023-04-05 13:22:01 "), Some(d));
        assert_eq!(parse_date_lenient("20230405.0"), Some(d));
        assert_eq!(parse_date_lenient("2023-13-45"), None);
        assert_eq!(parse_date_lenient("미상"), None);
        assert_eq!(parse_date_lenient(""), None);
    }

    #[test]
    fn test_lenient_datetime_keeps_time() {
        let dt = parse_datetime_lenient("2024-01-02 03:04:05").unwrap();
        assert_eq!(dt.to_string(), "2024-01-02 03:04:05");
        let dt = parse_datetime_lenient("2024-01-02T03:04").unwrap();
        assert_eq!(dt.to_string(), "2024-01-02 03:04:00");
        assert_eq!(parse_datetime_lenient("2024-01-02 25:99"), None);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_number_lenient("1,234.5"), Some(1234.5));
        assert_eq!(parse_number_lenient(" 99.17 "), Some(99.17));
        assert_eq!(parse_number_lenient(""), None);
        assert_eq!(parse_number_lenient("NaN"), None);
    }

    #[test]
    fn test_normalize_row() {
        let headers = strings(&[
            "사업장명", "소재지전체주소", "도로명전체주소", "영업상태명", "인허가일자",
            "폐업일자", "소재지면적", "총면적", "좌표정보(X)", "좌표정보(Y)",
        ]);
        let mapping = ColumnMapping::resolve(&headers);
        let row = strings(&[
            "카페 A", "서울특별시 강남구 역삼동 123", "서울특별시 강남구 테헤란로 1", "영업/정상",
            "20200101", "잘못된날짜", "0", "99.17", "202000.5", "445000.25",
        ]);
        let rec = normalize_row(&mapping, &row, "a.zip#b.csv");
        assert_eq!(rec.business_name, "카페 A");
        assert_eq!(rec.address, "서울특별시 강남구 역삼동 123");
        assert_eq!(rec.road_address.as_deref(), Some("서울특별시 강남구 테헤란로 1"));
        assert_eq!(rec.identity_key, identity_key("카페 A", "서울특별시 강남구 역삼동 123"));
        assert_eq!(rec.permit_date, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(rec.closure_date, None);
        assert_eq!(rec.site_area, Some(0.0));
        assert_eq!(rec.total_area, Some(99.17));
        assert_eq!(rec.raw_x, Some(202000.5));
        assert_eq!(rec.phone, None);
        assert_eq!(rec.source, "a.zip#b.csv");
    }

    #[test]
    fn test_normalize_table_with_missing_columns() {
        let table = SourceTable {
            source: "a.zip#b.csv".to_string(),
            headers: strings(&["사업장명", "주소"]),
            rows: vec![strings(&["가게", "서울 강남구 역삼동 1"]), strings(&["", ""])],
            ..Default::default()
        };
        let unmapped = ColumnMapping::resolve(&table.headers).unmapped_fields();
        assert!(unmapped.contains(&CanonicalField::PermitDate));
        assert!(!unmapped.contains(&CanonicalField::GenericAddress));

        let logger = StageLogger::new(crate::models::stats_models::PipelineStage::Normalize);
        let records = normalize_table(&table, &logger);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].address, "서울 강남구 역삼동 1");
        assert_eq!(records[0].permit_date, None);
        assert_eq!(records[1].identity_key, "_");
    }

    #[test]
    fn test_short_rows_do_not_panic() {
        let headers = strings(&["사업장명", "주소", "폐업일자"]);
        let mapping = ColumnMapping::resolve(&headers);
        let rec = normalize_row(&mapping, &strings(&["가게"]), "x");
        assert_eq!(rec.address, "");
        assert_eq!(rec.closure_date, None);
    }
}
