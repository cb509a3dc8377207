//! Outbound request augmentation and inbound response classification.
//!
//! The resource client runs [`request`] before the transport and [`response`] after it. The
//! live augmentation sits in an [`AugmentationSlot`], which is read once per dispatch and swapped
//! whole after a refresh, so a request that already passed augmentation keeps the token it was
//! sent with.

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;
