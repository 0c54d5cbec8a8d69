use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{Router, extract::DefaultBodyLimit};
use hubspid_auth::{
    AssertionConsumer, TokenService, build_token_backend,
    clients::{AttributeAuthority, HttpAttributeAuthority, HttpPersonalDataVault, PersonalDataVault},
    http::{GatewayState, gateway_router},
};
use hubspid_cache::{MemoryCache, RedisCache, RedisClusterCache, SharedCache};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{AppConfig, RedisConfig};

const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

pub struct HubspidServer {
    addr: SocketAddr,
    app: Router,
}

/// Connects the session cache described by `cfg`.
///
/// A configured Redis that cannot be reached is a startup error.
pub async fn create_session_cache(cfg: &RedisConfig) -> anyhow::Result<SharedCache> {
    if !cfg.enabled {
        tracing::warn!("Redis disabled, sessions are local to this instance");
        let cache = Arc::new(MemoryCache::new());
        spawn_memory_purge(cache.clone());
        return Ok(cache as SharedCache);
    }

    let cache: SharedCache = if cfg.cluster_enabled {
        let nodes = cfg.nodes();
        tracing::info!(nodes = nodes.len(), "Connecting to Redis Cluster");
        Arc::new(RedisClusterCache::connect(&nodes).await?)
    } else {
        tracing::info!(pool_size = cfg.pool_size, "Connecting to Redis");
        Arc::new(RedisCache::connect(&cfg.url, cfg.pool_size, cfg.timeout())?)
    };

    if !cache.ping().await? {
        anyhow::bail!("{} did not acknowledge PING", cache.kind());
    }
    tracing::info!(cache = cache.kind(), "Session cache ready");
    Ok(cache)
}

fn spawn_memory_purge(cache: Arc<MemoryCache>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MEMORY_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Expired sessions purged");
            }
        }
    });
}

/// Wires the token service, external adapters and assertion consumer.
pub fn build_state(cfg: &AppConfig, cache: SharedCache) -> anyhow::Result<GatewayState> {
    let gateway = &cfg.auth;

    let backend = build_token_backend(gateway, cache.clone())?;
    let token_service = Arc::new(TokenService::new(
        backend,
        gateway.token.include_user_on_introspection,
    ));

    let attribute_authority: Option<Arc<dyn AttributeAuthority>> =
        if gateway.attribute_authority.enabled {
            tracing::info!(
                endpoint = %gateway.attribute_authority.api_endpoint,
                "Attribute Authority enabled"
            );
            Some(Arc::new(HttpAttributeAuthority::from_settings(
                &gateway.attribute_authority,
            )?))
        } else {
            None
        };

    let personal_data_vault: Option<Arc<dyn PersonalDataVault>> = if gateway.user_registry.enabled
    {
        tracing::info!(url = %gateway.user_registry.url, "Personal Data Vault enabled");
        Some(Arc::new(HttpPersonalDataVault::from_settings(
            &gateway.user_registry,
        )?))
    } else {
        None
    };

    let assertion_consumer = Arc::new(AssertionConsumer::from_config(
        gateway,
        token_service.clone(),
        attribute_authority.clone(),
        personal_data_vault,
    ));

    Ok(GatewayState {
        token_service,
        assertion_consumer,
        cache,
        attribute_authority,
        l1_token_header_name: gateway.attribute_authority.l1_token_header_name.clone(),
    })
}

pub fn build_app(cfg: &AppConfig, state: GatewayState) -> Router {
    gateway_router(state).layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|req: &axum::http::Request<_>| {
                        // Query strings may carry tokens; only the path is recorded.
                        tracing::info_span!(
                            "http.request",
                            http.method = %req.method(),
                            http.target = %req.uri().path(),
                        )
                    })
                    .on_response(
                        |res: &axum::http::Response<_>, latency: Duration, _span: &tracing::Span| {
                            tracing::info!(
                                http.status = %res.status().as_u16(),
                                elapsed_ms = %latency.as_millis(),
                                "request handled"
                            );
                        },
                    ),
            )
            .layer(TimeoutLayer::new(cfg.request_timeout()))
            .layer(DefaultBodyLimit::max(cfg.server.body_limit_bytes)),
    )
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<HubspidServer> {
        let cache = create_session_cache(&self.config.redis).await?;
        let state = build_state(&self.config, cache)?;
        let app = build_app(&self.config, state);

        Ok(HubspidServer {
            addr: self.addr,
            app,
        })
    }
}

impl HubspidServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
