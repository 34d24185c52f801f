//! Testing utilities and mock implementations
//!
//! Lets the publish and subscribe workflows run without an MQTT broker.

pub mod mocks;

pub use mocks::*;
