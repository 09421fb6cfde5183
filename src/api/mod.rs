//! External surfaces of the core.

pub mod http;

pub use http::router;
