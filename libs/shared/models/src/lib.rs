pub mod auth;
pub mod clock;
pub mod error;
pub mod timestamps;
