mod app;
mod catalog;
mod config;
mod event;
mod health;
mod protocol;
mod session;
mod transport;

use app::CodinitApp;
use catalog::LibraryCatalog;
use config::AppConfig;
use eframe::egui;
use session::SessionController;
use std::sync::mpsc;
use tracing_subscriber::EnvFilter;
use transport::WsConnector;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codinit=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_catalog(config: &AppConfig) -> Result<LibraryCatalog, catalog::CatalogError> {
    match &config.catalog_path {
        Some(path) => {
            let catalog = LibraryCatalog::load(path)?;
            tracing::info!(
                path = %path.display(),
                entries = catalog.entries().len(),
                "loaded library catalog"
            );
            Ok(catalog)
        }
        None => Ok(LibraryCatalog::builtin()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let catalog = load_catalog(&config)?;
    tracing::info!(
        endpoint = %config.endpoint,
        health_url = %config.health_url,
        connect_timeout = ?config.connect_timeout,
        "starting codinit"
    );

    let (tx, rx) = mpsc::channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("codinit-runtime")
        .build()?;

    health::spawn_health_check(runtime.handle(), config.health_url.clone(), tx.clone());

    let connector = WsConnector::new(
        config.endpoint.clone(),
        config.connect_timeout,
        runtime.handle().clone(),
        tx,
    );
    let app = CodinitApp::new(rx, SessionController::new(connector), catalog);
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([1024.0, 640.0]),
        ..Default::default()
    };

    eframe::run_native(
        "CodInit",
        native_options,
        Box::new(move |_creation_context| Ok(Box::new(app))),
    )?;

    Ok(())
}
