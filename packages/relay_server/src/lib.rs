#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::sync::LazyLock;

use actix_web::error::ErrorServiceUnavailable;
use tokio::sync::RwLock;

pub mod api;
pub mod config;
pub mod logging;
pub mod ws;

pub static RELAY_SERVER_HANDLE: LazyLock<RwLock<Option<ws::server::RelayServerHandle>>> =
    LazyLock::new(|| RwLock::new(None));

/// Handle of the running relay server.
///
/// # Errors
///
/// * If the relay server has not been started or is shutting down
pub async fn relay_server_handle() -> Result<ws::server::RelayServerHandle, actix_web::Error> {
    RELAY_SERVER_HANDLE
        .read()
        .await
        .clone()
        .ok_or_else(|| ErrorServiceUnavailable("Relay server is not running"))
}
