//! # beacon-auth
//!
//! Authentication for Beacon. The HTTP and WebSocket surfaces identify the
//! caller from a signed JWT access token; everything else about accounts
//! and sessions lives outside this service.
//!
//! ## Modules
//!
//! - `jwt`: JWT token creation and validation

pub mod jwt;

pub use jwt::{Claims, JwtDecoder, JwtEncoder};
