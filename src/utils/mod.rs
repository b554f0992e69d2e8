pub mod constants;
pub mod location_locks;

pub use constants::*;
pub use location_locks::{LocationGuard, LocationLocks};
