/// Synthetic fallback data.
///
/// Used when the surveillance database cannot be reached, so the rest of
/// the pipeline and the dashboard still have something to show. Climate
/// follows each municipality's seasonal profile; rainfall is gamma
/// distributed; case counts are Poisson draws whose rate is itself a capped
/// mix of gamma draws. Output is fully determined by the seed.

use chrono::{Duration, NaiveDate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Gamma, Poisson};

use super::IngestError;
use crate::model::{DiseaseMap, RawRecord, RawTable};
use crate::municipalities::Municipality;

/// Radians swept by the temperature and humidity curves over the period.
const TEMPERATURE_SPAN: f64 = 10.0;
const HUMIDITY_SPAN: f64 = 8.0;

/// Poisson rate: `min(weight * Gamma(a) + Gamma(b), cap)`.
struct CaseRate {
    primary: Gamma<f64>,
    weight: f64,
    secondary: Gamma<f64>,
    cap: f64,
}

impl CaseRate {
    fn new(primary: (f64, f64), weight: f64, secondary: (f64, f64), cap: f64) -> Result<Self, IngestError> {
        Ok(Self {
            primary: gamma(primary.0, primary.1)?,
            weight,
            secondary: gamma(secondary.0, secondary.1)?,
            cap,
        })
    }

    fn sample_cases(&self, rng: &mut StdRng) -> f64 {
        let rate = (self.weight * self.primary.sample(rng) + self.secondary.sample(rng)).min(self.cap);
        match Poisson::new(rate) {
            Ok(poisson) => poisson.sample(rng),
            Err(_) => 0.0,
        }
    }
}

fn gamma(shape: f64, scale: f64) -> Result<Gamma<f64>, IngestError> {
    Gamma::new(shape, scale).map_err(|e| IngestError::Synthetic(e.to_string()))
}

/// Evenly spaced point `i` of `n` over `[0, span]`.
fn linspace_at(i: usize, n: usize, span: f64) -> f64 {
    if n <= 1 {
        0.0
    } else {
        span * i as f64 / (n - 1) as f64
    }
}

/// Generates `days` consecutive daily rows per municipality starting at `start`.
///
/// Rows are grouped by municipality, each in date order.
pub fn generate_synthetic(
    municipalities: &[&Municipality],
    start: NaiveDate,
    days: usize,
    seed: u64,
) -> Result<RawTable, IngestError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let rainfall = gamma(2.0, 5.0)?;
    let rates = DiseaseMap {
        dengue: CaseRate::new((2.0, 5.0), 0.5, (2.0, 2.0), 10.0)?,
        zika: CaseRate::new((1.0, 3.0), 0.3, (1.0, 1.0), 5.0)?,
        chikungunya: CaseRate::new((1.0, 2.0), 0.2, (1.0, 1.0), 3.0)?,
    };

    let mut records = Vec::with_capacity(municipalities.len() * days);
    for municipality in municipalities {
        let profile = municipality.climate;
        for i in 0..days {
            let date = start + Duration::days(i as i64);
            let temperature = linspace_at(i, days, TEMPERATURE_SPAN).sin() * profile.temperature_amplitude_c
                + profile.temperature_base_c;
            let humidity = linspace_at(i, days, HUMIDITY_SPAN).cos() * profile.humidity_amplitude_pct
                + profile.humidity_base_pct;

            records.push(RawRecord {
                timestamp: date.format("%Y-%m-%d").to_string(),
                location: municipality.name.to_string(),
                temperature: Some(temperature),
                humidity: Some(humidity),
                precipitation: Some(rainfall.sample(&mut rng)),
                cases: DiseaseMap {
                    dengue: Some(rates.dengue.sample_cases(&mut rng)),
                    zika: Some(rates.zika.sample_cases(&mut rng)),
                    chikungunya: Some(rates.chikungunya.sample_cases(&mut rng)),
                },
            });
        }
    }

    tracing::warn!(rows = records.len(), seed, "synthetic data generated");
    Ok(RawTable::with_standard_columns(records))
}
