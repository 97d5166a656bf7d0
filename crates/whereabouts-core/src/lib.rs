pub mod access;
pub mod clock;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use access::AccessPolicy;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::WhereaboutsConfig;
pub use error::{Result, WhereaboutsError};
pub use traits::{PersonDirectory, Spreadsheets, StatusStore};
pub use types::*;
