use crate::handlers;
use crate::hub::{Hub, HubConfig};
use crate::middleware::with_request_logging;
use crate::service::GameService;
use crate::settings::AppSettings;
use gemstone_engine::catalog::{Catalog, StaticCatalog};
use gemstone_engine::engine::GameEngine;
use gemstone_engine::errors::GameError;
use gemstone_engine::state::{GameId, PlayerId};
use gemstone_engine::store::InMemoryStore;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::filters::BoxedFilter;
use warp::reply::{Reply, Response};
use warp::Filter;

/// Largest accepted JSON request body.
const MAX_BODY_BYTES: u64 = 16 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: String,
    port: u16,
    keep_alive: Duration,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            keep_alive: Duration::from_secs(15),
        }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(settings.host.clone(), settings.port).with_keep_alive(settings.keep_alive())
    }

    pub fn for_tests() -> Self {
        Self::new("127.0.0.1", 0)
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }
}

/// Shared components behind every route. Building one starts the hub
/// actor, so it must happen inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: ServerConfig,
    service: Arc<GameService>,
}

impl AppContext {
    pub fn new(settings: &AppSettings) -> Result<Self, ServerError> {
        settings
            .validate()
            .map_err(|err| ServerError::ConfigError(err.to_string()))?;

        let catalog: Arc<dyn Catalog> = match &settings.catalog_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading card catalog");
                Arc::new(StaticCatalog::from_path(path)?)
            }
            None => Arc::new(StaticCatalog::standard()),
        };

        let mut engine = GameEngine::new(Arc::new(InMemoryStore::new()), catalog);
        if let Some(seed) = settings.seed {
            engine = engine.with_seed(seed);
        }

        let (hub, _actor) = Hub::spawn(HubConfig {
            intake_capacity: settings.hub_intake_capacity,
            outbound_capacity: settings.outbound_queue_capacity,
        });
        let service = GameService::new(Arc::new(engine), hub, settings.storage_timeout());

        Ok(Self::new_with_dependencies(
            ServerConfig::from_settings(settings),
            Arc::new(service),
        ))
    }

    pub fn new_with_dependencies(config: ServerConfig, service: Arc<GameService>) -> Self {
        Self { config, service }
    }

    /// Seeded engine, built-in catalog, default hub sizes.
    pub fn new_for_tests() -> Self {
        let engine = GameEngine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(StaticCatalog::standard()),
        )
        .with_seed(42);
        let (hub, _actor) = Hub::spawn(HubConfig::default());
        let service = GameService::new(Arc::new(engine), hub, Duration::from_secs(2));
        Self::new_with_dependencies(ServerConfig::for_tests(), Arc::new(service))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn service(&self) -> Arc<GameService> {
        Arc::clone(&self.service)
    }

    pub fn hub(&self) -> &Hub {
        self.service.hub()
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Catalog error: {0}")]
    Catalog(#[from] GameError),
}

#[derive(Debug, Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(settings: &AppSettings) -> Result<Self, ServerError> {
        let context = AppContext::new(settings)?;
        Ok(Self { context })
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let bind_addr = Self::bind_addr(context.config())?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let routes = Self::routes(&context);
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        tracing::info!(address = %addr, "web server listening");

        let task = tokio::spawn(async move {
            server_future.await;
            Ok(())
        });

        Ok(ServerHandle::new(addr, shutdown_tx, task, context))
    }

    fn bind_addr(config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        let host = config.host();

        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }

        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, config.port()));
        }

        let candidate = format!("{}:{}", host, config.port());
        let mut addrs = candidate.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`: {err}"))
        })?;

        addrs.next().ok_or_else(|| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`"))
        })
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(source) = err.source() {
            if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
                let recreated = std::io::Error::new(io_err.kind(), io_err.to_string());
                return ServerError::BindError(recreated);
            }
        }

        ServerError::ConfigError(err.to_string())
    }

    /// Every route, with rejections rendered as JSON errors.
    pub fn routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let health = Self::health_route(context);
        let lobby = Self::lobby_routes(context);
        let games = Self::game_routes(context);
        let stats = Self::stats_routes(context);
        let events = Self::sse_routes(context);

        let routes = health
            .or(lobby)
            .unify()
            .or(games)
            .unify()
            .or(stats)
            .unify()
            .or(events)
            .unify()
            .recover(handlers::handle_rejection)
            .unify()
            .boxed();

        with_request_logging(routes)
    }

    fn health_route(context: &AppContext) -> BoxedFilter<(Response,)> {
        let service = context.service();
        warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .map(move || handlers::health(service.hub()).into_response())
            .boxed()
    }

    fn lobby_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let service = context.service();

        let create = warp::path!("api" / "games")
            .and(warp::post())
            .and(Self::with_service(service.clone()))
            .and(Self::json_body())
            .and_then(
                |service: Arc<GameService>, request: handlers::CreateGameRequest| async move {
                    let response = handlers::create_game(service, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let list = warp::path!("api" / "games")
            .and(warp::get())
            .and(warp::query::<handlers::ListGamesQuery>())
            .and(Self::with_service(service.clone()))
            .and_then(
                |query: handlers::ListGamesQuery, service: Arc<GameService>| async move {
                    let response = handlers::list_games(service, query).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let join = warp::path!("api" / "games" / "join")
            .and(warp::post())
            .and(Self::with_service(service))
            .and(Self::json_body())
            .and_then(
                |service: Arc<GameService>, request: handlers::JoinGameRequest| async move {
                    let response = handlers::join_game(service, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        create.or(list).unify().or(join).unify().boxed()
    }

    fn game_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let service = context.service();

        let details = warp::path!("api" / "games" / GameId)
            .and(warp::get())
            .and(Self::with_service(service.clone()))
            .and_then(|game_id: GameId, service: Arc<GameService>| async move {
                let response = handlers::game_details(service, game_id).await;
                Ok::<_, Infallible>(response)
            });

        let state = warp::path!("api" / "games" / GameId / "state")
            .and(warp::get())
            .and(warp::query::<handlers::StateQuery>())
            .and(Self::with_service(service.clone()))
            .and_then(
                |game_id: GameId,
                 query: handlers::StateQuery,
                 service: Arc<GameService>| async move {
                    let response = handlers::game_state(service, game_id, query).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let leave = warp::path!("api" / "games" / GameId / "leave")
            .and(warp::post())
            .and(Self::with_service(service.clone()))
            .and(Self::json_body())
            .and_then(
                |game_id: GameId,
                 service: Arc<GameService>,
                 request: handlers::PlayerRequest| async move {
                    let response = handlers::leave_game(service, game_id, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let start = warp::path!("api" / "games" / GameId / "start")
            .and(warp::post())
            .and(Self::with_service(service.clone()))
            .and(Self::json_body())
            .and_then(
                |game_id: GameId,
                 service: Arc<GameService>,
                 request: handlers::PlayerRequest| async move {
                    let response = handlers::start_game(service, game_id, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let gems = warp::path!("api" / "games" / GameId / "gems")
            .and(warp::post())
            .and(Self::with_service(service.clone()))
            .and(Self::json_body())
            .and_then(
                |game_id: GameId,
                 service: Arc<GameService>,
                 request: handlers::TakeGemsRequest| async move {
                    let response = handlers::take_gems(service, game_id, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let purchase = warp::path!("api" / "games" / GameId / "purchase")
            .and(warp::post())
            .and(Self::with_service(service.clone()))
            .and(Self::json_body())
            .and_then(
                |game_id: GameId,
                 service: Arc<GameService>,
                 request: handlers::PurchaseRequest| async move {
                    let response = handlers::purchase_card(service, game_id, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        let reserve = warp::path!("api" / "games" / GameId / "reserve")
            .and(warp::post())
            .and(Self::with_service(service))
            .and(Self::json_body())
            .and_then(
                |game_id: GameId,
                 service: Arc<GameService>,
                 request: handlers::ReserveRequest| async move {
                    let response = handlers::reserve_card(service, game_id, request).await;
                    Ok::<_, Infallible>(response)
                },
            );

        details
            .or(state)
            .unify()
            .or(leave)
            .unify()
            .or(start)
            .unify()
            .or(gems)
            .unify()
            .or(purchase)
            .unify()
            .or(reserve)
            .unify()
            .boxed()
    }

    fn stats_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let service = context.service();

        let player = warp::path!("api" / "stats" / "users" / PlayerId)
            .and(warp::get())
            .and(Self::with_service(service.clone()))
            .and_then(|player_id: PlayerId, service: Arc<GameService>| async move {
                let response = handlers::player_stats(service, player_id).await;
                Ok::<_, Infallible>(response)
            });

        let leaderboard = warp::path!("api" / "stats" / "leaderboard")
            .and(warp::get())
            .and(warp::query::<handlers::LeaderboardQuery>())
            .and(Self::with_service(service))
            .and_then(
                |query: handlers::LeaderboardQuery, service: Arc<GameService>| async move {
                    let response = handlers::leaderboard(service, query).await;
                    Ok::<_, Infallible>(response)
                },
            );

        player.or(leaderboard).unify().boxed()
    }

    fn sse_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let service = context.service();
        let keep_alive = context.config().keep_alive();

        warp::path!("api" / "games" / GameId / "events")
            .and(warp::get())
            .and(warp::query::<handlers::EventsQuery>())
            .and(Self::with_service(service))
            .and_then(
                move |game_id: GameId,
                      query: handlers::EventsQuery,
                      service: Arc<GameService>| async move {
                    let response =
                        handlers::stream_events(service, game_id, query, keep_alive).await;
                    Ok::<_, Infallible>(response)
                },
            )
            .boxed()
    }

    fn with_service(
        service: Arc<GameService>,
    ) -> impl Filter<Extract = (Arc<GameService>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&service))
    }

    fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
    where
        T: DeserializeOwned + Send,
    {
        warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
    }
}

#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
    context: AppContext,
}

impl ServerHandle {
    fn new(
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Result<(), ServerError>>,
        context: AppContext,
    ) -> Self {
        Self {
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
            context,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(result) => result?,
                Err(err) => {
                    return Err(ServerError::ConfigError(format!(
                        "server task join error: {err}"
                    )))
                }
            }
        }

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
