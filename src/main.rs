mod auth;
mod bootstrap;
mod config;
mod error;
mod log_sink;
mod question_selector;
mod room;
mod seed;
mod session;
mod store;
mod timer_loop;

use std::sync::Arc;

use log::{error, info};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() {
    let config = config::get_config().unwrap();
    config.logging.to_dispatch().apply().unwrap();

    info!("starting server on {}", config.listen_addr);

    let state = match bootstrap::build(&config).await {
        Ok(state) => Arc::new(Mutex::new(state)),
        Err(err) => {
            error!("failed to start: {}", err);
            std::process::exit(1);
        }
    };

    tokio::spawn(timer_loop::run(state.clone()));

    let listener = match TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {}: {}", config.listen_addr, err);
            std::process::exit(1);
        }
    };

    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                info!("connection accepted: {}", peer);
                let state = state.clone();
                tokio::spawn(async move {
                    session::handle_connection(socket, peer, state).await;
                });
            }
            Err(err) => {
                error!("accept failed: {}", err);
            }
        }
    }
}
