//! # gemstone-web: live game service
//!
//! HTTP and Server-Sent-Events front end for [`gemstone_engine`]. Players
//! manage rooms and submit actions over JSON routes; everyone connected to
//! a game's room receives each committed change as a `game_event`.
//!
//! - [`hub`] - Broadcast hub actor keyed by game id
//! - [`service`] - Engine calls under storage timeouts, followed by events
//! - [`events`] - Event envelope sent to rooms
//! - [`server`] / [`handlers`] - warp routes
//! - [`settings`] / [`logging`] - Configuration and tracing setup

pub mod errors;
pub mod events;
pub mod handlers;
pub mod hub;
pub mod logging;
pub mod middleware;
pub mod server;
pub mod service;
pub mod settings;

pub use errors::{ErrorResponse, ErrorSeverity, IntoErrorResponse};
pub use events::{EventType, GameEvent};
pub use hub::{Connection, ConnectionId, Hub, HubConfig, HubError, Payload};
pub use logging::{init_logging, init_test_logging, LogEntry, TestLogSubscriber};
pub use middleware::{log_response, with_request_logging};
pub use server::{AppContext, ServerConfig, ServerError, ServerHandle, WebServer};
pub use service::{GameService, ServiceError, Subscription};
pub use settings::{AppSettings, LogFormat, SettingsError};
