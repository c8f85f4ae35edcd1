use std::collections::HashMap;

use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::info;
use uuid::Uuid;

use crate::models::AppState;

pub mod handler;

pub use handler::ChessSocket;

/// WebSocket connection handler. The optional `user` query parameter scopes
/// persistence; anonymous connections get a throwaway identity.
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<HashMap<String, String>>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let id = Uuid::new_v4().to_string();
    let user = query.get("user").cloned().unwrap_or_else(|| id.clone());
    info!("New WebSocket connection: {} (user {})", id, user);
    ws::start(ChessSocket::new(id, user, app_state), &req, stream)
}
