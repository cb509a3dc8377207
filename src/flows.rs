//! Token lifecycle flows: the refresh-token grant and 401 recovery.

pub mod refresh;
pub mod unauthenticated;

pub use refresh::*;
pub use unauthenticated::*;
