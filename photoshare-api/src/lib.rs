//! # PhotoShare API Server
//!
//! REST API for sharing photos: accounts with email confirmation and JWT
//! sessions, image upload to a cloud image service, URL-based image
//! transformations, QR codes and comments.
//!
//! ## Modules
//!
//! - `app`: Application state, router builder and JWT middleware
//! - `config`: Configuration from environment variables
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers and signup rate limiting
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
