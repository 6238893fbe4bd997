//! Miqat library: prayer schedule, countdown and qibla direction engine.

use clap::ValueEnum;

pub mod core;
pub mod engine;
pub mod location;
pub mod qibla;
pub mod schedule;

#[cfg(test)]
pub mod test_support;

/// Where automatic positioning comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum PositionSource {
    /// Approximate position from the public IP address.
    #[default]
    Ip,
    /// No automatic positioning; only a configured place is used.
    Off,
}
