//! poolscribe entry point.

mod app;
mod audio;
mod commands;
mod config;
mod history;
mod job;
mod logging;
mod pool;
mod state;
mod transcription;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
