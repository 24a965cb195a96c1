//! Common types shared by the frontdoor crates
//!
//! - [`domain`]: the normalized [`Domain`] newtype
//! - [`errors`]: the [`FrontDoorError`] taxonomy and result alias

pub mod domain;
pub mod errors;

pub use domain::{Domain, DomainError, WWW_PREFIX};
pub use errors::{FrontDoorError, FrontDoorResult};
