use std::path::Path;

use actix_files::{Files, NamedFile};
use actix_web::{
    Result, route,
    web::{self, Json},
};
use serde_json::{Value, json};

use crate::{config::Config, relay_server_handle};

#[route("/health", method = "GET")]
pub async fn health_endpoint() -> Result<Json<Value>> {
    let stats = relay_server_handle()
        .await?
        .stats()
        .await
        .map_err(actix_web::error::ErrorServiceUnavailable)?;

    log::debug!("Healthy: {stats:?}");

    Ok(Json(json!({
        "healthy": true,
        "hash": env!("GIT_HASH"),
        "connections": stats.connections,
        "rooms": stats.rooms,
        "visitors": stats.visitors,
    })))
}

/// Secondary client page.
#[route("/1", method = "GET")]
pub async fn demo_page_endpoint(config: web::Data<Config>) -> Result<NamedFile> {
    Ok(NamedFile::open_async(config.static_dir.join("demo.html")).await?)
}

/// Every other file under `static_dir`, with `index.html` at `/`.
#[must_use]
pub fn static_files(static_dir: &Path) -> Files {
    Files::new("/", static_dir).index_file("index.html")
}
