//! Pitstop catalog demo.
//!
//! Loads the tire catalog from the configured backend, optionally narrows it
//! with a search query given as the first argument, and prints the result.
//!
//! ```text
//! PITSTOP_API_BASE_URL=http://localhost:8080 cargo run -p pitstop -- pilot
//! ```

use anyhow::Context;
use pitstop::inventory::filter::FilterField;
use pitstop::inventory::{InventoryAction, InventoryEnvironment, InventoryReducer, InventorySettings, InventoryState, is_in_stock};
use pitstop::{AppConfig, HttpTransport, ShopClient, StaticSession};
use pitstop_runtime::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_filter).context("parsing RUST_LOG")?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    pitstop_runtime::metrics::describe_metrics();

    info!(
        base_url = %config.api.base_url,
        timeout_secs = config.api.timeout.as_secs(),
        set_size = config.screens.purchase_set_size,
        "Configuration loaded"
    );

    let session = Arc::new(StaticSession::from_config(&config.session));
    let transport = HttpTransport::new(&config.api, session).context("building HTTP client")?;
    let client = ShopClient::new(Arc::new(transport));
    let settings = InventorySettings::from(&config.screens);
    let set_size = settings.set_size;
    let debounce = settings.filter_debounce;

    let store = Store::new(
        InventoryState::default(),
        InventoryReducer,
        InventoryEnvironment::new(client, settings),
    );

    let wait = config.api.timeout + Duration::from_secs(1);
    store
        .send_and_wait_for(
            InventoryAction::Load,
            |action| matches!(action, InventoryAction::TiresLoaded(_)),
            wait,
        )
        .await
        .context("loading the catalog")?;

    if let Some(error) = store.state(InventoryState::last_error_message).await {
        anyhow::bail!("catalog unavailable: {error}");
    }

    if let Some(query) = std::env::args().nth(1) {
        info!(%query, "Applying search");
        store
            .send_and_wait_for(
                InventoryAction::SetFilter(FilterField::SearchText(query)),
                |action| matches!(action, InventoryAction::ApplyFilters),
                debounce + Duration::from_secs(1),
            )
            .await
            .context("applying the search")?;
    }

    let (visible, brands) = store
        .state(|state| (state.visible().to_vec(), state.available_brands()))
        .await;
    info!(count = visible.len(), brands = ?brands, "Catalog ready");

    for tire in &visible {
        println!(
            "{:>6}  {:<12} {:<24} {:<12} {:>10}  {}",
            tire.id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            tire.brand.as_deref().unwrap_or("Unknown"),
            tire.model.as_deref().unwrap_or_default(),
            tire.size.as_deref().unwrap_or_default(),
            tire.price.map_or_else(|| "-".to_string(), |price| format!("{price:.0}")),
            if is_in_stock(tire, set_size) { "in stock" } else { "out of stock" },
        );
    }

    store.shutdown_default().await.context("shutting down")?;
    Ok(())
}
