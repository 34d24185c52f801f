//! The two command workflows
//!
//! Both are generic over [`crate::transport::Session`] and own the session
//! exclusively for the duration of the command.

pub mod publish;
pub mod subscribe;

pub use publish::BodySource;
