//! # PhotoShare Shared Library
//!
//! This crate contains the data layer, authentication primitives and external
//! service clients used by the PhotoShare API server.
//!
//! ## Module Organization
//!
//! - `auth`: Password hashing, JWT tokens, auth context and role checks
//! - `db`: Connection pool and migrations
//! - `models`: Database models (users, images, tags, comments)
//! - `redis`: Redis client, token blocklist and user cache
//! - `cloud`: Cloud image storage and URL transformations
//! - `qr`: QR code rendering
//! - `mail`: Outgoing email

pub mod auth;
pub mod cloud;
pub mod db;
pub mod mail;
pub mod models;
pub mod qr;
pub mod redis;

/// Current version of the PhotoShare shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
