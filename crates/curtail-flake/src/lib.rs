mod clock;
pub mod error;
mod flake;
mod short_id;

pub use clock::{Clock, SystemClock};
pub use error::Error;
pub use flake::{machine_id_from_host, Flake, FlakeSettings};
pub use short_id::ShortId;
