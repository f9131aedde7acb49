//! Credential model, redacted secrets, and requested scope lists.

pub mod credential;
pub mod scope;
pub mod secret;

pub use credential::*;
pub use scope::*;
pub use secret::*;
