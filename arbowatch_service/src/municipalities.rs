/// Municipality registry for the arbovirus early-warning service.
///
/// Defines the canonical list of municipalities monitored by this service,
/// with their IBGE codes, coordinates, and the seasonal climate profile used
/// to generate fallback data. All other modules should reference
/// municipalities from here rather than hardcoding names.

// ---------------------------------------------------------------------------
// Municipality metadata
// ---------------------------------------------------------------------------

/// Seasonal climate shape of a municipality, used by the synthetic generator.
///
/// Temperature follows `base + amplitude * sin(t)` and humidity
/// `base + amplitude * cos(t)` over the generated period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateProfile {
    pub temperature_base_c: f64,
    pub temperature_amplitude_c: f64,
    pub humidity_base_pct: f64,
    pub humidity_amplitude_pct: f64,
}

/// Metadata for a single monitored municipality.
pub struct Municipality {
    /// Official name, exactly as stored in the surveillance database.
    pub name: &'static str,
    /// Two-letter state code.
    pub state: &'static str,
    /// 7-digit IBGE municipality code.
    pub ibge_code: &'static str,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    pub climate: ClimateProfile,
}

/// All municipalities monitored by the service.
///
/// Sources:
///   - Codes: IBGE municipal register
///   - Climate profiles: rough seasonal ranges, only used for synthetic data
pub static MUNICIPALITY_REGISTRY: &[Municipality] = &[
    Municipality {
        name: "Teófilo Otoni",
        state: "MG",
        ibge_code: "3168606",
        latitude: -17.8575,
        longitude: -41.5053,
        climate: ClimateProfile {
            temperature_base_c: 25.0,
            temperature_amplitude_c: 10.0,
            humidity_base_pct: 60.0,
            humidity_amplitude_pct: 20.0,
        },
    },
    Municipality {
        name: "Diamantina",
        state: "MG",
        ibge_code: "3121605",
        latitude: -18.2494,
        longitude: -43.6000,
        climate: ClimateProfile {
            temperature_base_c: 22.0,
            temperature_amplitude_c: 8.0,
            humidity_base_pct: 65.0,
            humidity_amplitude_pct: 15.0,
        },
    },
];

/// Returns the names of all monitored municipalities.
pub fn all_names() -> Vec<&'static str> {
    MUNICIPALITY_REGISTRY.iter().map(|m| m.name).collect()
}

/// Looks up a municipality by name. Returns `None` if not found.
pub fn find_municipality(name: &str) -> Option<&'static Municipality> {
    MUNICIPALITY_REGISTRY.iter().find(|m| m.name == name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
