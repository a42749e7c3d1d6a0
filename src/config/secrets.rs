//! Secret handling utilities.
//!
//! Re-exports secrecy types used by the binary to unwrap connection
//! secrets at the point of use.

pub use secrecy::{ExposeSecret, SecretString};
