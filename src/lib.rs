pub(crate) mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod routing;
pub mod shaping;
pub mod state;
pub mod stream;
pub mod upstream;

mod util;
