//! # Pitstop
//!
//! Client state layer for a tire shop and service booking app.
//!
//! Each screen is a [`Store`](pitstop_runtime::Store) running one of the
//! reducers below. Remote work is scheduled under single-flight keys, so
//! repeated or rapid UI events never let a stale response overwrite a newer
//! one.
//!
//! ## Screens
//!
//! - [`inventory`]: tire catalog with a debounced filter and set purchase
//! - [`admin::appointments`]: appointments of one day, bucketed by day
//! - [`admin::orders`]: order list for administrators
//! - [`news`]: news feed and the administrator's composer
//! - [`booking`]: slot selection and booking for one service
//!
//! ## Example
//!
//! ```ignore
//! let config = AppConfig::from_env()?;
//! let session = Arc::new(StaticSession::from_config(&config.session));
//! let transport = HttpTransport::new(&config.api, session)?;
//! let client = ShopClient::new(Arc::new(transport));
//!
//! let store = Store::new(
//!     InventoryState::default(),
//!     InventoryReducer,
//!     InventoryEnvironment::new(client, InventorySettings::from(&config.screens)),
//! );
//! store.send(InventoryAction::Load).await?;
//! ```

/// Administrator screens
pub mod admin;
/// Slot selection and booking
pub mod booking;
/// Typed backend client
pub mod client;
/// Environment-driven configuration
pub mod config;
/// Server date-time format
pub mod dates;
/// Tire catalog screen
pub mod inventory;
/// News feed and composer
pub mod news;
/// Signed-in identity
pub mod session;
/// reqwest-backed transport
pub mod transport;

pub use client::ShopClient;
pub use config::{AppConfig, ConfigError};
pub use session::StaticSession;
pub use transport::HttpTransport;
