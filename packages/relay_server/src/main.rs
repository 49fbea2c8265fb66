#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_cors::Cors;
use actix_web::{App, middleware, web};
use relay_server::{RELAY_SERVER_HANDLE, api, config::Config, logging, ws};
use tokio::try_join;

fn main() -> Result<(), std::io::Error> {
    if let Err(e) = logging::init() {
        eprintln!("Failed to initialize logging: {e:?}");
    }

    let config = Config::from_env().map_err(std::io::Error::other)?;

    log::debug!("Starting with {config:?}");

    let threads = config.max_blocking_threads;

    actix_web::rt::System::with_tokio_rt(move || {
        log::debug!("Running with {threads} max blocking threads");
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .max_blocking_threads(threads)
            .build()
            .expect("Failed to build tokio runtime")
    })
    .block_on(async move {
        let (relay_server, relay_server_handle) = ws::server::RelayServer::new();
        let relay_server = tokio::spawn(relay_server.run());

        RELAY_SERVER_HANDLE
            .write()
            .await
            .replace(relay_server_handle);

        let serve_static = config.static_dir.is_dir();
        if !serve_static {
            log::warn!(
                "Static directory {} not found; client pages will not be served",
                config.static_dir.display()
            );
        }

        let app_config = web::Data::new(config.clone());

        let app = move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allowed_methods(vec!["GET", "POST"])
                .max_age(3600);

            let app = App::new()
                .app_data(app_config.clone())
                .wrap(cors)
                .wrap(middleware::Logger::default())
                .service(api::health_endpoint)
                .service(ws::api::websocket);

            if serve_static {
                app.service(api::demo_page_endpoint)
                    .service(api::static_files(&app_config.static_dir))
            } else {
                app
            }
        };

        let mut http_server = actix_web::HttpServer::new(app);

        if let Some(workers) = config.workers {
            log::debug!("Running with {workers} Actix workers");
            http_server = http_server.workers(workers);
        }

        let http_server = http_server
            .bind((config.bind_addr.as_str(), config.port))?
            .run();

        log::info!(
            "Server running on http://{}:{}",
            config.bind_addr,
            config.port
        );

        if let Err(err) = try_join!(
            async move {
                let resp = http_server.await;

                log::debug!("Shutting down relay server...");
                if let Some(handle) = RELAY_SERVER_HANDLE.write().await.take() {
                    handle.shutdown();
                }

                resp
            },
            async move {
                let resp = relay_server.await.map_err(std::io::Error::other)?;
                log::debug!("RelayServer closed");
                resp
            },
        ) {
            log::error!("Error on shutdown: {err:?}");
            return Err(err);
        }

        log::debug!("Server shut down");

        Ok(())
    })
}
