//! Concrete connection backends.

#[cfg(feature = "backend-postgres")]
mod pg;

#[cfg(feature = "backend-postgres")]
pub use pg::PgConnectionCreator;
