//! Microsoft identity platform authentication.
//!
//! Provides the device code credential and the in-memory token types it hands out.

pub mod device_code;
pub mod token;

pub use device_code::DeviceCodeCredential;
