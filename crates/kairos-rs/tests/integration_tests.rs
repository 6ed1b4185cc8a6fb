//! End-to-end tests wiring actix-web services the way `kairos-gateway`
//! does: health/metrics endpoints, and the proxy pipeline against both an
//! `internal` backend and real upstream HTTP servers spun up on ephemeral
//! ports, matching the end-to-end scenarios a faithful reimplementation of
//! this proxy is expected to satisfy.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{test, web, App, HttpServer};

use kairos_rs::config::hot_reload::TopologyWatcher;
use kairos_rs::listener_factory::{self, ListenerFactoryConfig};
use kairos_rs::models::acl::{AclAction, AclRule};
use kairos_rs::models::settings::{
    BackendNodeSettings, BackendSettings, ListenerSettings, PageSettings, Settings,
};
use kairos_rs::models::topology::{BalanceMode, ConnectMode, HttpProto, ListenMode, NodeHealth};
use kairos_rs::proxy::ProxyHandler;
use kairos_rs::routes::{health, management, metrics, proxy_route};

/// Spins up a minimal upstream HTTP server on an OS-assigned port that
/// always answers with `body`, returning the port it ended up bound to.
async fn spawn_upstream(body: &'static str) -> u16 {
    let server = HttpServer::new(move || {
        App::new().route(
            "/{tail:.*}",
            web::get().to(move || {
                let body = body.to_string();
                async move { actix_web::HttpResponse::Ok().body(body) }
            }),
        )
    })
    .bind(("127.0.0.1", 0))
    .unwrap();
    let port = server.addrs()[0].port();
    tokio::spawn(server.run());
    port
}

fn proxy_handler(watcher: Arc<TopologyWatcher>) -> Arc<ProxyHandler> {
    let client = listener_factory::build_client(&ListenerFactoryConfig::default()).unwrap();
    let mut clients = ahash::HashMap::default();
    clients.insert("public".to_string(), client.clone());
    Arc::new(ProxyHandler::new(watcher, clients, client, Duration::from_secs(5)))
}

fn internal_backend_settings() -> Settings {
    Settings {
        version: 1,
        listeners: vec![ListenerSettings {
            name: "public".into(),
            bind_ip: "127.0.0.1".parse().unwrap(),
            port: 8080,
            mode: ListenMode::Http,
            http_proto: HttpProto::Two,
            source_ip: None,
            default_error_page: None,
            default_maintenance_page: None,
            backends: vec![BackendSettings {
                host: "internal.local".into(),
                connect_mode: ConnectMode::Internal,
                balance_mode: BalanceMode::RoundRobin,
                inbound_acls: vec![],
                outbound_acls: vec![],
                error_page: None,
                maintenance_page: None,
                nodes: vec![],
            }],
        }],
    }
}

#[actix_web::test]
async fn health_endpoints_respond_ok() {
    let watcher = Arc::new(
        TopologyWatcher::new(internal_backend_settings(), "./config.json".into()).unwrap(),
    );
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(watcher))
            .configure(health::configure_health),
    )
    .await;

    for path in ["/health", "/ready", "/live"] {
        let req = test::TestRequest::get().uri(path).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200, "path {path} should return 200");
    }
}

#[actix_web::test]
async fn metrics_endpoint_reports_prometheus_text() {
    let watcher = Arc::new(
        TopologyWatcher::new(internal_backend_settings(), "./config.json".into()).unwrap(),
    );

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(watcher))
            .configure(metrics::configure_metrics),
    )
    .await;

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body = test::read_body(resp).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("kairos_listener_client_connects_total"));
}

#[actix_web::test]
async fn management_status_reports_configured_listeners() {
    let watcher = Arc::new(
        TopologyWatcher::new(internal_backend_settings(), "./config.json".into()).unwrap(),
    );

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(watcher))
            .configure(management::configure_management),
    )
    .await;

    let req = test::TestRequest::get().uri("/manage/status").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body = test::read_body(resp).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("public"));
    assert!(text.contains("internal.local"));
}

#[actix_web::test]
async fn internal_backend_is_handled_without_a_network_call() {
    let watcher = Arc::new(
        TopologyWatcher::new(internal_backend_settings(), "./config.json".into()).unwrap(),
    );
    let client = listener_factory::build_client(&ListenerFactoryConfig::default()).unwrap();
    let mut clients = ahash::HashMap::default();
    clients.insert("public".to_string(), client.clone());
    let handler = Arc::new(ProxyHandler::new(
        watcher,
        clients,
        client,
        Duration::from_secs(5),
    ));

    let app = test::init_service(
        App::new().configure(|cfg| proxy_route::configure_proxy(cfg, handler.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/anything")
        .insert_header(("Host", "internal.local"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

/// A request with no `mercid` cookie gets one stamped on the way out.
#[actix_web::test]
async fn session_id_hook_sets_mercid_when_absent() {
    let watcher = Arc::new(
        TopologyWatcher::new(internal_backend_settings(), "./config.json".into()).unwrap(),
    );
    let handler = proxy_handler(watcher);
    let app = test::init_service(
        App::new().configure(|cfg| proxy_route::configure_proxy(cfg, handler.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/anything")
        .insert_header(("Host", "internal.local"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let set_cookie = resp.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("mercid="));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(!set_cookie.contains("Secure"));
}

/// A request that already carries a `mercid` cookie is left alone.
#[actix_web::test]
async fn session_id_hook_leaves_existing_mercid_untouched() {
    let watcher = Arc::new(
        TopologyWatcher::new(internal_backend_settings(), "./config.json".into()).unwrap(),
    );
    let handler = proxy_handler(watcher);
    let app = test::init_service(
        App::new().configure(|cfg| proxy_route::configure_proxy(cfg, handler.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/anything")
        .insert_header(("Host", "internal.local"))
        .insert_header(("Cookie", "mercid=already-set"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get("set-cookie").is_none());
}

/// Scenario 1 (§8): two healthy round-robin nodes answer two sequential
/// requests in rotation, and each node's connects counter lands at exactly 1.
#[actix_web::test]
async fn round_robin_alternates_between_two_healthy_nodes() {
    let port_a = spawn_upstream("N1").await;
    let port_b = spawn_upstream("N2").await;

    let settings = Settings {
        version: 1,
        listeners: vec![ListenerSettings {
            name: "public".into(),
            bind_ip: "127.0.0.1".parse().unwrap(),
            port: 8080,
            mode: ListenMode::Http,
            http_proto: HttpProto::One,
            source_ip: None,
            default_error_page: None,
            default_maintenance_page: None,
            backends: vec![BackendSettings {
                host: "web.example".into(),
                connect_mode: ConnectMode::Http,
                balance_mode: BalanceMode::RoundRobin,
                inbound_acls: vec![],
                outbound_acls: vec![],
                error_page: None,
                maintenance_page: None,
                nodes: vec![
                    BackendNodeSettings {
                        ip: "127.0.0.1".parse().unwrap(),
                        port: port_a,
                    },
                    BackendNodeSettings {
                        ip: "127.0.0.1".parse().unwrap(),
                        port: port_b,
                    },
                ],
            }],
        }],
    };

    let watcher = Arc::new(TopologyWatcher::new(settings, "./config.json".into()).unwrap());
    let handler = proxy_handler(watcher.clone());
    let app = test::init_service(
        App::new().configure(|cfg| proxy_route::configure_proxy(cfg, handler.clone())),
    )
    .await;

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/")
            .insert_header(("Host", "web.example"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body = test::read_body(resp).await;
        bodies.push(String::from_utf8(body.to_vec()).unwrap());
    }

    assert_ne!(bodies[0], bodies[1], "round-robin should alternate nodes");
    assert!(bodies.contains(&"N1".to_string()));
    assert!(bodies.contains(&"N2".to_string()));

    let topology = watcher.current_topology().await;
    let backend = topology.listeners[0].find_backend_by_host("web.example").unwrap();
    for node in &backend.nodes {
        assert_eq!(node.statistics.snapshot().connects, 1);
    }
}

/// Scenario 2 (§8): a request with no `Host` header gets a 400 page.
#[actix_web::test]
async fn missing_host_header_yields_400() {
    let watcher = Arc::new(
        TopologyWatcher::new(internal_backend_settings(), "./config.json".into()).unwrap(),
    );
    let handler = proxy_handler(watcher);
    let app = test::init_service(
        App::new().configure(|cfg| proxy_route::configure_proxy(cfg, handler.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/")
        .insert_header(("Host", ""))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body = test::read_body(resp).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("Invalid request - no host was supplied"));
}

/// Scenario 3 (§8): a request for a host with no configured backend gets a
/// 503 page mentioning the missing backend.
#[actix_web::test]
async fn unknown_host_yields_503() {
    let watcher = Arc::new(
        TopologyWatcher::new(internal_backend_settings(), "./config.json".into()).unwrap(),
    );
    let handler = proxy_handler(watcher);
    let app = test::init_service(
        App::new().configure(|cfg| proxy_route::configure_proxy(cfg, handler.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/")
        .insert_header(("Host", "nope.example"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 503);
    let body = test::read_body(resp).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("no backend found"));
}

/// Scenario 4 (§8): the only node is under maintenance and the backend
/// configures a maintenance page; the response must be exactly that page's
/// body with the `x-statuscode` header preserved.
#[actix_web::test]
async fn node_under_maintenance_serves_backend_maintenance_page() {
    let settings = Settings {
        version: 1,
        listeners: vec![ListenerSettings {
            name: "public".into(),
            bind_ip: "127.0.0.1".parse().unwrap(),
            port: 8080,
            mode: ListenMode::Http,
            http_proto: HttpProto::One,
            source_ip: None,
            default_error_page: None,
            default_maintenance_page: None,
            backends: vec![BackendSettings {
                host: "web.example".into(),
                connect_mode: ConnectMode::Http,
                balance_mode: BalanceMode::RoundRobin,
                inbound_acls: vec![],
                outbound_acls: vec![],
                error_page: None,
                maintenance_page: Some(PageSettings {
                    content: "<h1>BRB</h1>".into(),
                    status_threshold: 0,
                }),
                nodes: vec![BackendNodeSettings {
                    ip: "127.0.0.1".parse().unwrap(),
                    port: 9,
                }],
            }],
        }],
    };

    let watcher = Arc::new(TopologyWatcher::new(settings, "./config.json".into()).unwrap());
    let topology = watcher.current_topology().await;
    let backend = topology.listeners[0].find_backend_by_host("web.example").unwrap();
    backend.nodes[0].set_health(NodeHealth::Maintenance);

    let handler = proxy_handler(watcher);
    let app = test::init_service(
        App::new().configure(|cfg| proxy_route::configure_proxy(cfg, handler.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/")
        .insert_header(("Host", "web.example"))
        .insert_header(("Cookie", "mercid=abc"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 503);
    assert_eq!(resp.headers().get("x-statuscode").unwrap(), "503");
    let body = test::read_body(resp).await;
    assert_eq!(body.as_ref(), b"<h1>BRB</h1>");
}

/// Scenario 5 (§8): an inbound allow-ACL that requires `X-User: gold`
/// denies a request lacking that header with a 403.
#[actix_web::test]
async fn allow_acl_miss_denies_with_403() {
    let settings = Settings {
        version: 1,
        listeners: vec![ListenerSettings {
            name: "public".into(),
            bind_ip: "127.0.0.1".parse().unwrap(),
            port: 8080,
            mode: ListenMode::Http,
            http_proto: HttpProto::One,
            source_ip: None,
            default_error_page: None,
            default_maintenance_page: None,
            backends: vec![BackendSettings {
                host: "web.example".into(),
                connect_mode: ConnectMode::Http,
                balance_mode: BalanceMode::RoundRobin,
                inbound_acls: vec![AclRule {
                    header_name: Some("x-user".into()),
                    header_value: Some("gold".into()),
                    cookie_name: None,
                    cookie_value: None,
                    action: AclAction::Allow,
                }],
                outbound_acls: vec![],
                error_page: None,
                maintenance_page: None,
                nodes: vec![BackendNodeSettings {
                    ip: "127.0.0.1".parse().unwrap(),
                    port: 9,
                }],
            }],
        }],
    };

    let watcher = Arc::new(TopologyWatcher::new(settings, "./config.json".into()).unwrap());
    let handler = proxy_handler(watcher);
    let app = test::init_service(
        App::new().configure(|cfg| proxy_route::configure_proxy(cfg, handler.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/")
        .insert_header(("Host", "web.example"))
        .insert_header(("Cookie", "mercid=abc"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    let body = test::read_body(resp).await;
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("does not match ALLOW ACL"));
}

/// Scenario 6 (§8): a forward that fails at the transport layer (nothing
/// listening on the node's port) gets a synthesized 500 with the no-cache
/// header triplet.
#[actix_web::test]
async fn transport_failure_yields_500_with_no_cache_headers() {
    let settings = Settings {
        version: 1,
        listeners: vec![ListenerSettings {
            name: "public".into(),
            bind_ip: "127.0.0.1".parse().unwrap(),
            port: 8080,
            mode: ListenMode::Http,
            http_proto: HttpProto::One,
            source_ip: None,
            default_error_page: None,
            default_maintenance_page: None,
            backends: vec![BackendSettings {
                host: "web.example".into(),
                connect_mode: ConnectMode::Http,
                balance_mode: BalanceMode::RoundRobin,
                inbound_acls: vec![],
                outbound_acls: vec![],
                error_page: None,
                maintenance_page: None,
                // Port 1 is reserved and nothing will ever accept on it in
                // the test sandbox, forcing a connection-refused transport
                // failure.
                nodes: vec![BackendNodeSettings {
                    ip: "127.0.0.1".parse().unwrap(),
                    port: 1,
                }],
            }],
        }],
    };

    let watcher = Arc::new(TopologyWatcher::new(settings, "./config.json".into()).unwrap());
    let handler = proxy_handler(watcher);
    let app = test::init_service(
        App::new().configure(|cfg| proxy_route::configure_proxy(cfg, handler.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/")
        .insert_header(("Host", "web.example"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);
    assert_eq!(
        resp.headers().get("Cache-Control").unwrap(),
        "no-cache, no-store, must-revalidate"
    );
}
