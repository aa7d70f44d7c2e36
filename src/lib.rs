pub mod aircraft;
pub mod config;
pub mod feed;
pub mod ground;
pub mod interpolate;
pub mod provider;
pub mod types;
pub mod util;
