//! Kairos reverse proxy server entry point.
//!
//! Loads and validates the gateway configuration, compiles it into a live
//! topology, builds one outbound client per listener, and binds an
//! actix-web server to every configured listener address.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use log::{error, info};
use tokio::signal;

use kairos_rs::config::hot_reload::TopologyWatcher;
use kairos_rs::config::settings::load_settings;
use kairos_rs::listener_factory::{self, ListenerFactoryConfig};
use kairos_rs::logs::logger::configure_logger;
use kairos_rs::models::topology::HttpProto;
use kairos_rs::proxy::ProxyHandler;
use kairos_rs::routes::{health, management, metrics, proxy_route};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let settings = load_settings().expect("failed to load configuration");
    info!("starting kairos-gateway, config version {}", settings.version);

    let config_path =
        std::env::var("KAIROS_CONFIG_PATH").unwrap_or_else(|_| "./config.json".to_string());

    let bind_addrs: Vec<(String, u16)> = settings
        .listeners
        .iter()
        .map(|l| (l.bind_ip.to_string(), l.port))
        .collect();

    let mut clients = ahash::HashMap::default();
    for listener in &settings.listeners {
        let client_config = ListenerFactoryConfig {
            source_ip: listener.source_ip,
            http2: matches!(listener.http_proto, HttpProto::Two),
            ..Default::default()
        };
        let client = listener_factory::build_client(&client_config)
            .expect("failed to build outbound client for listener");
        clients.insert(listener.name.clone(), client);
    }
    let default_client = listener_factory::build_client(&ListenerFactoryConfig::default())
        .expect("failed to build default outbound client");

    let watcher = Arc::new(
        TopologyWatcher::new(settings, config_path)
            .expect("failed to compile initial configuration"),
    );
    watcher.start_watching();

    let proxy_handler = Arc::new(ProxyHandler::new(
        watcher.clone(),
        clients,
        default_client,
        Duration::from_secs(30),
    ));

    if bind_addrs.is_empty() {
        error!("no listeners configured, nothing to bind");
        std::process::exit(1);
    }

    let watcher_for_server = watcher.clone();
    let proxy_for_server = proxy_handler.clone();
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(watcher_for_server.clone()))
            .wrap(Logger::new(r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#))
            .wrap(actix_web::middleware::Compress::default())
            .configure(health::configure_health)
            .configure(metrics::configure_metrics)
            .configure(management::configure_management)
            .configure(|cfg| proxy_route::configure_proxy(cfg, proxy_for_server.clone()))
    });

    for (host, port) in &bind_addrs {
        info!("binding listener on {host}:{port}");
        server = server.bind((host.as_str(), *port))?;
    }

    let running = server.run();

    tokio::select! {
        result = running => {
            match result {
                Ok(_) => info!("server stopped gracefully"),
                Err(e) => error!("server error: {e}"),
            }
        }
        _ = signal::ctrl_c() => {
            info!("received shutdown signal, stopping server...");
        }
    }

    Ok(())
}
