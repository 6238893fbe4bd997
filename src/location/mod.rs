pub mod provider;
pub mod resolver;
pub mod types;

pub use provider::{FixedPosition, IpGeolocation, NoPosition, PositionProvider};
pub use resolver::{
    LocationResolver, ResolveTicket, Transition, acquire_position, validate_manual,
};
pub use types::{
    Coordinates, LocationKey, LocationStatus, ManualEntryError, PositionError, ResolvedLocation,
};
