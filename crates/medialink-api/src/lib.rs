// medialink-api: async REST clients for the services of a self-hosted media stack

pub mod arr;
pub mod auth;
pub mod bazarr;
pub mod error;
pub mod jellyfin;
pub mod jellyseerr;
pub mod qbittorrent;
pub mod rest;
pub mod sabnzbd;
pub mod transport;

pub use arr::{ApiVersion, ArrClient};
pub use auth::ApiAuth;
pub use bazarr::BazarrClient;
pub use error::Error;
pub use jellyfin::JellyfinClient;
pub use jellyseerr::JellyseerrClient;
pub use qbittorrent::QbitClient;
pub use rest::RestClient;
pub use sabnzbd::SabnzbdClient;
pub use transport::TransportConfig;
