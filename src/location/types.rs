use std::fmt;

use serde::{Deserialize, Serialize};

/// A point on the globe in decimal degrees.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Returns `None` unless latitude is within [-90, 90] and longitude within [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self { latitude, longitude })
    }

    pub fn is_valid(&self) -> bool {
        Self::new(self.latitude, self.longitude).is_some()
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Where the user is, as far as downstream consumers are concerned.
///
/// Produced by the resolver and replaced wholesale, never edited in place.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ResolvedLocation {
    Coordinates(Coordinates),
    PlaceName { city: String, country: String },
}

impl ResolvedLocation {
    /// Hashable identity of this location, used for cache keys and stale-response checks.
    pub fn key(&self) -> LocationKey {
        match self {
            ResolvedLocation::Coordinates(c) => LocationKey::Coordinates {
                latitude_bits: c.latitude.to_bits(),
                longitude_bits: c.longitude.to_bits(),
            },
            ResolvedLocation::PlaceName { city, country } => LocationKey::PlaceName {
                city: city.clone(),
                country: country.clone(),
            },
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            ResolvedLocation::Coordinates(c) => Some(*c),
            ResolvedLocation::PlaceName { .. } => None,
        }
    }
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedLocation::Coordinates(c) => write!(f, "{c}"),
            ResolvedLocation::PlaceName { city, country } => write!(f, "{city}, {country}"),
        }
    }
}

/// Exact identity of a [`ResolvedLocation`]. Coordinates compare bit-for-bit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocationKey {
    Coordinates {
        latitude_bits: u64,
        longitude_bits: u64,
    },
    PlaceName {
        city: String,
        country: String,
    },
}

/// Resolution progress.
///
/// `Granted` always carries coordinates and `Manual` a place name;
/// `Idle` and `Denied` carry nothing.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationStatus {
    #[default]
    Idle,
    Resolving,
    Granted,
    Denied,
    Manual,
}

impl LocationStatus {
    pub fn label(self) -> &'static str {
        match self {
            LocationStatus::Idle => "idle",
            LocationStatus::Resolving => "resolving",
            LocationStatus::Granted => "granted",
            LocationStatus::Denied => "denied",
            LocationStatus::Manual => "manual",
        }
    }
}

/// Why a one-shot position request produced nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionError {
    /// The user or platform refused location access.
    PermissionDenied,
    /// No fix within the allotted time.
    Timeout,
    /// The capability is missing or the source failed.
    Unavailable(String),
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionError::PermissionDenied => write!(f, "location permission denied"),
            PositionError::Timeout => write!(f, "location request timed out"),
            PositionError::Unavailable(msg) => write!(f, "location unavailable: {msg}"),
        }
    }
}

impl std::error::Error for PositionError {}

/// Rejection of a manual place entry. No state change accompanies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualEntryError {
    EmptyCity,
    EmptyCountry,
}

impl fmt::Display for ManualEntryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManualEntryError::EmptyCity => write!(f, "city must not be empty"),
            ManualEntryError::EmptyCountry => write!(f, "country must not be empty"),
        }
    }
}

impl std::error::Error for ManualEntryError {}
