use crate::hub::Hub;
use serde::Serialize;
use warp::reply::Json;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    rooms: usize,
}

pub fn health(hub: &Hub) -> Json {
    warp::reply::json(&HealthBody {
        status: "ok",
        rooms: hub.room_count(),
    })
}
