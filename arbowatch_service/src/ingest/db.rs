/// Surveillance database loader.
///
/// Reads sub-daily climate readings and daily arbovirus case notifications
/// for the monitored municipalities and hands them to `daily::aggregate_daily`.
/// The source schema belongs to the surveillance system; these queries
/// only read it.

use chrono::{NaiveDate, NaiveDateTime};
use postgres::{Client, NoTls};

use super::IngestError;
use super::daily::{CaseReport, ClimateReading, aggregate_daily};
use crate::logging::{self, Stage};
use crate::model::{DiseaseMap, RawTable};

const CLIMATE_QUERY: &str = "
    SELECT
        data_hora::timestamp         AS observed_at,
        municipio                    AS location,
        temperatura_media::float8    AS temperature,
        umidade_media::float8        AS humidity,
        precipitacao::float8         AS precipitation
    FROM dados_climaticos
    WHERE municipio = ANY($1)
";

const CASES_QUERY: &str = "
    SELECT
        data_coleta::date            AS reported_on,
        municipio                    AS location,
        dengue::float8               AS dengue,
        zika::float8                 AS zika,
        chikungunya::float8          AS chikungunya
    FROM dados_arboviroses
    WHERE municipio = ANY($1)
";

/// Opens a connection to the surveillance database.
pub fn connect(database_url: &str) -> Result<Client, IngestError> {
    Ok(Client::connect(database_url, NoTls)?)
}

/// Fetches raw climate readings for the given municipalities.
pub fn fetch_climate_readings(
    client: &mut Client,
    municipalities: &[String],
) -> Result<Vec<ClimateReading>, IngestError> {
    let rows = client.query(CLIMATE_QUERY, &[&municipalities])?;

    let readings: Vec<ClimateReading> = rows
        .iter()
        .map(|row| ClimateReading {
            observed_at: row.get::<_, NaiveDateTime>("observed_at"),
            location: row.get("location"),
            temperature: row.get("temperature"),
            humidity: row.get("humidity"),
            precipitation: row.get("precipitation"),
        })
        .collect();

    logging::info(
        Stage::Ingest,
        None,
        &format!("climate readings loaded: {} rows", readings.len()),
    );
    Ok(readings)
}

/// Fetches arbovirus case notifications for the given municipalities.
pub fn fetch_case_reports(
    client: &mut Client,
    municipalities: &[String],
) -> Result<Vec<CaseReport>, IngestError> {
    let rows = client.query(CASES_QUERY, &[&municipalities])?;

    let reports: Vec<CaseReport> = rows
        .iter()
        .map(|row| CaseReport {
            date: row.get::<_, NaiveDate>("reported_on"),
            location: row.get("location"),
            cases: DiseaseMap {
                dengue: row.get("dengue"),
                zika: row.get("zika"),
                chikungunya: row.get("chikungunya"),
            },
        })
        .collect();

    logging::info(
        Stage::Ingest,
        None,
        &format!("case reports loaded: {} rows", reports.len()),
    );
    Ok(reports)
}

/// Loads the daily raw table for the given municipalities.
pub fn load_from_database(
    client: &mut Client,
    municipalities: &[String],
) -> Result<RawTable, IngestError> {
    let readings = fetch_climate_readings(client, municipalities)?;
    let reports = fetch_case_reports(client, municipalities)?;
    let table = aggregate_daily(&readings, &reports);

    logging::info(
        Stage::Ingest,
        None,
        &format!("daily table assembled: {} rows", table.len()),
    );
    Ok(table)
}
