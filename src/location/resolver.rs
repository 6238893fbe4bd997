//! # Location Resolver
//!
//! Combines automatic positioning with a manual city/country fallback.
//!
//! ```text
//!   Idle ──begin_automatic──▶ Resolving ──complete(Ok)──▶ Granted
//!                                  │
//!                                  └──complete(Err)──▶ Denied
//!
//!   any ──submit_manual──▶ Manual   (bumps the generation, so a pending
//!                                    automatic result is ignored)
//! ```
//!
//! The resolver holds no I/O. The owner calls [`begin_automatic`], runs
//! [`acquire_position`] somewhere, then feeds the outcome back through
//! [`complete_automatic`] together with the ticket it was given. Failures are
//! absorbed into `Denied`; nothing here returns an error for them.
//!
//! [`begin_automatic`]: LocationResolver::begin_automatic
//! [`complete_automatic`]: LocationResolver::complete_automatic

use std::time::Duration;

use log::{debug, info, warn};

use super::provider::PositionProvider;
use super::types::{Coordinates, LocationStatus, ManualEntryError, PositionError, ResolvedLocation};

/// Upper bound for a single position request.
pub const DEFAULT_POSITION_TIMEOUT: Duration = Duration::from_secs(10);

/// Identifies one automatic request. Results carrying an older ticket are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveTicket(u64);

/// What a completed transition did to the resolved location.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The location was replaced. Carries the previous value, if any.
    Replaced { previous: Option<ResolvedLocation> },
    /// The location was cleared (automatic request failed).
    Cleared { previous: Option<ResolvedLocation> },
    /// A stale result arrived; nothing changed.
    Ignored,
}

#[derive(Debug, Clone, Default)]
pub struct LocationResolver {
    status: LocationStatus,
    location: Option<ResolvedLocation>,
    generation: u64,
}

impl LocationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> LocationStatus {
        self.status
    }

    pub fn location(&self) -> Option<&ResolvedLocation> {
        self.location.as_ref()
    }

    /// Marks an automatic request as in flight and hands out its ticket.
    ///
    /// The previously resolved location stays visible while resolving.
    pub fn begin_automatic(&mut self) -> ResolveTicket {
        self.generation += 1;
        self.status = LocationStatus::Resolving;
        debug!("Automatic location request #{} started", self.generation);
        ResolveTicket(self.generation)
    }

    /// Applies the outcome of the request identified by `ticket`.
    pub fn complete_automatic(
        &mut self,
        ticket: ResolveTicket,
        outcome: Result<Coordinates, PositionError>,
    ) -> Transition {
        if ticket.0 != self.generation || self.status != LocationStatus::Resolving {
            debug!(
                "Dropping location result for request #{} (current #{}, status {})",
                ticket.0,
                self.generation,
                self.status.label()
            );
            return Transition::Ignored;
        }

        match outcome {
            Ok(coords) => {
                info!("Location granted: {}", coords);
                self.status = LocationStatus::Granted;
                let previous = self.location.replace(ResolvedLocation::Coordinates(coords));
                Transition::Replaced { previous }
            }
            Err(e) => {
                warn!("Location unavailable: {}", e);
                self.status = LocationStatus::Denied;
                Transition::Cleared {
                    previous: self.location.take(),
                }
            }
        }
    }

    /// Switches to a user-entered place. Inputs are trimmed; either being empty
    /// rejects the entry and leaves the resolver untouched.
    pub fn submit_manual(&mut self, city: &str, country: &str) -> Result<Transition, ManualEntryError> {
        let (city, country) = validate_manual(city, country)?;

        // Invalidates any in-flight automatic request.
        self.generation += 1;
        self.status = LocationStatus::Manual;
        info!("Manual location set: {}, {}", city, country);
        let previous = self.location.replace(ResolvedLocation::PlaceName {
            city: city.to_string(),
            country: country.to_string(),
        });
        Ok(Transition::Replaced { previous })
    }

    /// Abandons an in-flight automatic request, falling back to whatever was
    /// resolved before it started.
    pub fn cancel_pending(&mut self) {
        if self.status != LocationStatus::Resolving {
            return;
        }
        self.generation += 1;
        self.status = match self.location {
            Some(ResolvedLocation::Coordinates(_)) => LocationStatus::Granted,
            Some(ResolvedLocation::PlaceName { .. }) => LocationStatus::Manual,
            None => LocationStatus::Idle,
        };
        debug!("Automatic location request cancelled, back to {}", self.status.label());
    }
}

/// Trims a manual entry and checks that neither part is empty.
pub fn validate_manual<'a>(city: &'a str, country: &'a str) -> Result<(&'a str, &'a str), ManualEntryError> {
    let city = city.trim();
    let country = country.trim();
    if city.is_empty() {
        return Err(ManualEntryError::EmptyCity);
    }
    if country.is_empty() {
        return Err(ManualEntryError::EmptyCountry);
    }
    Ok((city, country))
}

/// Runs one position request against `provider`, bounded by `timeout`.
pub async fn acquire_position(
    provider: &dyn PositionProvider,
    timeout: Duration,
) -> Result<Coordinates, PositionError> {
    debug!("Requesting position from {} (timeout {:?})", provider.name(), timeout);
    match tokio::time::timeout(timeout, provider.current_position()).await {
        Ok(Ok(coords)) if coords.is_valid() => Ok(coords),
        Ok(Ok(coords)) => Err(PositionError::Unavailable(format!(
            "provider returned out-of-range coordinates {coords}"
        ))),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(PositionError::Timeout),
    }
}
