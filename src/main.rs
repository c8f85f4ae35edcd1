use actix_web::{web, App, HttpServer};
use log::info;

use chess_console::models::AppState;
use chess_console::persistence::FileStore;
use chess_console::routes::configure_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let bind_addr =
        std::env::var("CHESS_CONSOLE_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let data_dir = std::env::var("CHESS_CONSOLE_DATA").unwrap_or_else(|_| "./data".to_string());

    info!("Starting chess console server at http://{}", bind_addr);

    let app_state = web::Data::new(AppState::new(FileStore::new(data_dir)));

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(configure_routes)
    })
    .bind(bind_addr)?
    .run()
    .await
}
