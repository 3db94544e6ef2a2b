#[cfg(feature = "sled")]
pub mod sled;
