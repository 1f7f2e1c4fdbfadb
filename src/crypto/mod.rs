//! RSA-PSS license signing and the key pairs that back it.
//!
//! Two pieces live here:
//! - [`key_store`] generates and stores the RSA key pairs licenses are signed with.
//! - [`signer`] turns a license payload into the `REP-XXXXXXXX-<envelope>` wire
//!   format, and verifies it back.

pub mod key_store;
pub mod signer;

pub use key_store::KeyPair;
pub use signer::{LicensePayload, LicenseSigner, LicenseVerifier, VerifiedLicense};
