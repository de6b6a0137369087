use std::sync::Arc;

use nfb_core::{config::Config, directory::ProfileDirectory};
use nfb_instagram::{InstagramConfig, InstagramDirectory};

#[tokio::main]
async fn main() -> Result<(), nfb_core::Error> {
    nfb_core::logging::init("nfb")?;

    let cfg = Arc::new(Config::load()?);
    tracing::debug!(config = ?cfg, "configuration loaded");

    let directory: Arc<dyn ProfileDirectory> = Arc::new(InstagramDirectory::new(
        InstagramConfig::from_config(&cfg),
    ));

    nfb_telegram::router::run_polling(cfg, directory)
        .await
        .map_err(|e| nfb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
