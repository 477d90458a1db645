//! Credential protection.
//!
//! Store passwords live in `Zeroizing` containers, are cleared on drop, and
//! are redacted from `Debug` output. The only place a password leaves its
//! container is the store URL handed to the driver.

mod credentials;

pub use credentials::Credentials;
