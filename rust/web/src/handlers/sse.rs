use crate::errors::IntoErrorResponse;
use crate::hub::Payload;
use crate::service::{GameService, Subscription};
use gemstone_engine::state::{GameId, PlayerId};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use warp::http;
use warp::reply::{self, Response};
use warp::sse;
use warp::Reply;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub player_id: Option<PlayerId>,
}

/// Subscribes the caller to a game's room as a Server-Sent-Events stream.
///
/// The first event is the `connected` welcome; every room event follows as
/// a `game_event`. The connection leaves the room when the client goes
/// away and the stream is dropped.
pub async fn stream_events(
    service: Arc<GameService>,
    game_id: GameId,
    query: EventsQuery,
    keep_alive: Duration,
) -> Response {
    let subscription = match service.subscribe(game_id, query.player_id).await {
        Ok(subscription) => subscription,
        Err(err) => return err.into_http_response(),
    };

    let keep_alive = sse::keep_alive().interval(keep_alive).text("keep-alive");
    let reply = sse::reply(keep_alive.stream(subscription_stream(subscription)));
    reply::with_header(reply, http::header::CACHE_CONTROL, "no-cache").into_response()
}

fn subscription_stream(
    subscription: Subscription,
) -> impl tokio_stream::Stream<Item = Result<sse::Event, Infallible>> {
    subscription.map(|payload| Ok::<_, Infallible>(render_payload(&payload)))
}

fn render_payload(payload: &Payload) -> sse::Event {
    sse::Event::default().event("game_event").data(payload.to_string())
}
