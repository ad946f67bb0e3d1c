//! Airport reference table
//!
//! Static lookup data for the "teleport to an airport" workflow: a compact
//! built-in list covering common fields, optionally replaced by a larger
//! JSON file in the OurAirports-derived record format. Searching is a plain
//! linear filter over the in-memory list.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Airport table errors
#[derive(Error, Debug)]
pub enum AirportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type AirportResult<T> = Result<T, AirportError>;

/// One airport record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airport {
    pub icao: String,
    #[serde(default)]
    pub iata: String,
    pub name: String,
    #[serde(rename = "lat")]
    pub lat_deg: f64,
    #[serde(rename = "lon")]
    pub lon_deg: f64,
    #[serde(rename = "elev", default)]
    pub elevation_ft: i32,
}

/// In-memory airport list
pub struct AirportTable {
    airports: Vec<Airport>,
}

impl AirportTable {
    /// The built-in list: a handful of well-known fields so the bridge is
    /// useful without any external data file.
    pub fn builtin() -> Self {
        let airports = vec![
            airport("EBBR", "BRU", "Brussels Airport", 50.9010, 4.4840, 184),
            airport("EGLL", "LHR", "London Heathrow Airport", 51.4706, -0.4619, 83),
            airport("EHAM", "AMS", "Amsterdam Airport Schiphol", 52.3086, 4.7639, -11),
            airport("LFPG", "CDG", "Charles de Gaulle International Airport", 49.0128, 2.5500, 392),
            airport("EDDF", "FRA", "Frankfurt am Main Airport", 50.0333, 8.5706, 364),
            airport("KJFK", "JFK", "John F Kennedy International Airport", 40.6398, -73.7789, 13),
            airport("KSFO", "SFO", "San Francisco International Airport", 37.6190, -122.3750, 13),
            airport("KBOS", "BOS", "Boston Logan International Airport", 42.3643, -71.0052, 20),
            airport("YSSY", "SYD", "Sydney Kingsford Smith Airport", -33.9461, 151.1772, 21),
            airport("RJTT", "HND", "Tokyo Haneda International Airport", 35.5523, 139.7800, 35),
        ];
        Self { airports }
    }

    /// Load a table from a JSON file (array of records as produced by the
    /// OurAirports conversion).
    pub fn load(path: &Path) -> AirportResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let airports: Vec<Airport> = serde_json::from_str(&contents)?;
        Ok(Self { airports })
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }

    /// Case-insensitive substring search over ICAO, IATA and name.
    pub fn search(&self, query: &str) -> Vec<&Airport> {
        let query = query.to_lowercase();
        self.airports
            .iter()
            .filter(|a| {
                a.icao.to_lowercase().contains(&query)
                    || a.iata.to_lowercase().contains(&query)
                    || a.name.to_lowercase().contains(&query)
            })
            .collect()
    }

    /// Exact ICAO lookup
    pub fn find(&self, icao: &str) -> Option<&Airport> {
        self.airports.iter().find(|a| a.icao.eq_ignore_ascii_case(icao))
    }
}

fn airport(icao: &str, iata: &str, name: &str, lat: f64, lon: f64, elev: i32) -> Airport {
    Airport {
        icao: icao.to_string(),
        iata: iata.to_string(),
        name: name.to_string(),
        lat_deg: lat,
        lon_deg: lon,
        elevation_ft: elev,
    }
}
