use std::sync::Arc;

use gtb_core::config::Config;

mod keepalive;

#[tokio::main]
async fn main() -> Result<(), gtb_core::Error> {
    gtb_core::logging::init("gtb");

    let cfg = Arc::new(Config::load()?);

    keepalive::spawn(cfg.clone());

    gtb_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| gtb_core::Error::Transport(format!("telegram bot failed: {e}")))?;

    Ok(())
}
