/// Middleware modules for the API server
///
/// - `security`: security response headers
/// - `rate_limit`: Redis token bucket for signups
///
/// JWT authentication lives in [`crate::app`] next to the router because it
/// needs the full application state.

pub mod rate_limit;
pub mod security;
