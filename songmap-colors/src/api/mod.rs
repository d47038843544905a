//! HTTP API handlers for songmap-colors

pub mod colors;
pub mod health;
pub mod songs;

pub use colors::color_routes;
pub use health::health_routes;
pub use songs::song_routes;
