/// CSV input and output.
///
/// The raw table is header-driven: columns may appear in any order and
/// unknown columns are ignored. The header row decides which columns count
/// as present, so a file without a `temperature` header is treated
/// differently from one whose temperature cells are all empty.

use std::fs::File;
use std::io;
use std::path::Path;

use super::IngestError;
use crate::model::{
    AlertRecord, COL_LOCATION, COL_TIMESTAMP, ClimateColumn, Disease, DiseaseMap, RawRecord,
    RawTable, standard_columns,
};

/// Cell values read as null, compared case-insensitively.
const NULL_TOKENS: [&str; 5] = ["", "null", "na", "nan", "none"];

/// Reads a raw table from CSV text with a header row.
pub fn read_raw_table<R: io::Read>(reader: R) -> Result<RawTable, IngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let timestamp_idx = position(COL_TIMESTAMP);
    let location_idx = position(COL_LOCATION);
    let climate_idx = ClimateColumn::ALL.map(|c| position(c.key()));
    let case_idx = DiseaseMap::from_fn(|d| position(d.key()));

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let text = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .unwrap_or_default()
                .to_string()
        };
        let number = |idx: Option<usize>| -> Result<Option<f64>, IngestError> {
            match idx {
                Some(i) => parse_cell(row, &headers[i], record.get(i).unwrap_or_default()),
                None => Ok(None),
            }
        };

        let [temperature, humidity, precipitation] = climate_idx;
        records.push(RawRecord {
            timestamp: text(timestamp_idx),
            location: text(location_idx),
            temperature: number(temperature)?,
            humidity: number(humidity)?,
            precipitation: number(precipitation)?,
            cases: DiseaseMap {
                dengue: number(case_idx[Disease::Dengue])?,
                zika: number(case_idx[Disease::Zika])?,
                chikungunya: number(case_idx[Disease::Chikungunya])?,
            },
        });
    }

    Ok(RawTable::new(headers, records))
}

/// Reads a raw table from a CSV file.
pub fn load_csv(path: &Path) -> Result<RawTable, IngestError> {
    let file = File::open(path)?;
    read_raw_table(file)
}

/// Writes a raw table using the standard column layout. Nulls become empty cells.
pub fn write_raw_table<W: io::Write>(writer: W, table: &RawTable) -> Result<(), IngestError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(standard_columns())?;

    let cell = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for r in &table.records {
        let mut row = vec![r.timestamp.clone(), r.location.clone()];
        row.extend(ClimateColumn::ALL.iter().map(|c| cell(r.climate(*c))));
        row.extend(Disease::ALL.iter().map(|d| cell(r.cases[*d])));
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes an alert list with columns timestamp, location, disease, risk_level.
pub fn write_alerts<W: io::Write>(writer: W, alerts: &[AlertRecord]) -> Result<(), IngestError> {
    let mut wtr = csv::Writer::from_writer(writer);
    if alerts.is_empty() {
        wtr.write_record(["timestamp", "location", "disease", "risk_level"])?;
    }
    for alert in alerts {
        wtr.serialize(alert)?;
    }
    wtr.flush()?;
    Ok(())
}

fn parse_cell(row: usize, column: &str, value: &str) -> Result<Option<f64>, IngestError> {
    let trimmed = value.trim();
    if NULL_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t)) {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| IngestError::InvalidValue {
            row,
            column: column.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = "\
timestamp,location,temperature,humidity,precipitation,dengue,zika,chikungunya
2024-03-01,Diamantina,23.5,71,0.0,4,0,1
2024-03-02,Diamantina,,NaN,12.5,null,1,0
";

    #[test]
    fn test_reads_values_and_nulls() {
        let table = read_raw_table(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.has_column("chikungunya"));

        let first = &table.records[0];
        assert_eq!(first.timestamp, "2024-03-01");
        assert_eq!(first.location, "Diamantina");
        assert_eq!(first.temperature, Some(23.5));
        assert_eq!(first.cases.dengue, Some(4.0));

        let second = &table.records[1];
        assert_eq!(second.temperature, None);
        assert_eq!(second.humidity, None);
        assert_eq!(second.cases.dengue, None);
        assert_eq!(second.cases.zika, Some(1.0));
    }

    #[test]
    fn test_absent_columns_are_not_declared() {
        let csv = "Location,Timestamp,dengue\nDiamantina,2024-03-01,2\n";
        let table = read_raw_table(csv.as_bytes()).unwrap();
        assert!(table.has_column("timestamp"));
        assert!(table.has_column("location"));
        assert!(!table.has_column("temperature"));
        assert_eq!(table.records[0].temperature, None);
        assert_eq!(table.records[0].cases.dengue, Some(2.0));
    }

    #[test]
    fn test_malformed_number_reports_row_and_column() {
        let csv = "timestamp,location,temperature\n2024-03-01,Diamantina,warm\n";
        let err = read_raw_table(csv.as_bytes()).unwrap_err();
        match err {
            IngestError::InvalidValue { row, column, value } => {
                assert_eq!(row, 0);
                assert_eq!(column, "temperature");
                assert_eq!(value, "warm");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_written_table_reads_back_identically() {
        let table = read_raw_table(SAMPLE.as_bytes()).unwrap();
        let mut buf = Vec::new();
        write_raw_table(&mut buf, &table).unwrap();
        let reread = read_raw_table(buf.as_slice()).unwrap();
        assert_eq!(reread.records, table.records);
    }

    #[test]
    fn test_alerts_written_with_header() {
        let alerts = vec![AlertRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            location: "Diamantina".to_string(),
            disease: Disease::Dengue,
            risk_level: 0.72,
        }];
        let mut buf = Vec::new();
        write_alerts(&mut buf, &alerts).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("timestamp,location,disease,risk_level"));
        assert_eq!(lines.next(), Some("2024-03-01,Diamantina,dengue,0.72"));
    }

    #[test]
    fn test_empty_alert_list_still_has_header() {
        let mut buf = Vec::new();
        write_alerts(&mut buf, &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().trim(), "timestamp,location,disease,risk_level");
    }

    #[test]
    fn test_load_csv_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(&path, SAMPLE).unwrap();
        let table = load_csv(&path).unwrap();
        assert_eq!(table.len(), 2);
    }
}
