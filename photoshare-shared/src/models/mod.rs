/// Database models
///
/// Each model is a `sqlx::FromRow` struct with associated async functions
/// taking a `&PgPool`.
///
/// - [`user`]: accounts and roles
/// - [`image`]: uploaded images
/// - [`tag`]: image tags and tag parsing
/// - [`comment`]: comments on images

pub mod comment;
pub mod image;
pub mod tag;
pub mod user;
