//! Development server backed by the in-memory channel provider.
//!
//! Environment:
//!
//! - `PLAZA_BIND`: listen address, default `127.0.0.1:8081`
//! - `PLAZA_DEMO_TOWN`: if set, a publicly listed town with this id and
//!   name is created at startup
//! - `RUST_LOG`: log filter, default `info`

use plaza::DEFAULT_BIND;
use plaza::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), PlazaError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let bind = std::env::var("PLAZA_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let demo_town = std::env::var("PLAZA_DEMO_TOWN")
        .ok()
        .filter(|name| !name.trim().is_empty());

    let config = TownConfig {
        well_known_id: demo_town.clone(),
        ..TownConfig::default()
    };
    let server = PlazaServerBuilder::new()
        .bind(&bind)
        .town_config(config)
        .build(MemoryProvider::new())
        .await?;

    if let Some(name) = demo_town {
        let (town_id, _) = server.create_town(&name, true).await?;
        tracing::info!(%town_id, "demo town ready");
    }

    server.run().await
}
