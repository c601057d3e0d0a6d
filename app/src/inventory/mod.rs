//! Tire catalog screen.
//!
//! Loads the catalog under a single-flight key, keeps a filtered view in
//! sync with it (debounced on criteria edits, immediate on reloads and
//! resets) and coordinates set purchases against possibly stale stock.

pub mod filter;
pub mod purchase;

use crate::client::ShopClient;
use crate::config::{AppConfig, ScreenConfig};
use filter::{FilterCriteria, FilterField, apply_filters};
use pitstop_core::classify::ErrorKind;
use pitstop_core::collection::RemoteCollectionState;
use pitstop_core::{SmallVec, async_effect, effect::Effect, reducer::Reducer, smallvec};
use purchase::{INSUFFICIENT_STOCK_MESSAGE, LocalRejection, PurchaseAttempt, PurchasePhase, check_local, resolve};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Single-flight key of the catalog load
pub const LOAD_KEY: &str = "load-tires";

/// Key of the pending filter recomputation
pub const FILTER_KEY: &str = "apply-filters";

/// Single-flight key of a purchase of one tire
#[must_use]
pub fn purchase_key(tire_id: i64) -> String {
    format!("purchase-{tire_id}")
}

// ============================================================================
// Catalog model
// ============================================================================

/// Tire season
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    /// Summer tires
    Summer,
    /// Studded winter tires
    WinterStudded,
    /// Studless winter tires
    WinterVelcro,
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Summer => "summer",
            Self::WinterStudded => "winter, studded",
            Self::WinterVelcro => "winter, studless",
        })
    }
}

/// One catalog entry. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tire {
    /// Catalog id
    pub id: Option<i64>,
    /// Manufacturer
    pub brand: Option<String>,
    /// Model line
    pub model: Option<String>,
    /// Size designation, e.g. `225/45 R17`
    pub size: Option<String>,
    /// Season
    pub season: Option<Season>,
    /// Unit price
    pub price: Option<f64>,
    /// Units in stock, as last reported by the server
    pub stock_quantity: Option<i64>,
    /// Product picture
    pub image_url: Option<String>,
}

/// Whether the cached stock covers a full set
#[must_use]
pub fn is_in_stock(tire: &Tire, set_size: u32) -> bool {
    tire.stock_quantity.unwrap_or(0) >= i64::from(set_size)
}

// ============================================================================
// State
// ============================================================================

/// Catalog screen state
#[derive(Debug, Clone, Default)]
pub struct InventoryState {
    /// Catalog as reported by the server
    pub tires: RemoteCollectionState<Tire>,
    /// Current filter selection
    pub criteria: FilterCriteria,
    price_edited: bool,
    visible: Vec<Tire>,
    visible_revision: u64,
    /// Purchase attempts by tire id, until acknowledged
    pub purchases: BTreeMap<i64, PurchaseAttempt>,
    /// Name of the last purchased item, for the success notice
    pub purchased_item: Option<String>,
    error_message: Option<String>,
}

impl InventoryState {
    /// Tires passing the filter, in server order
    #[must_use]
    pub fn visible(&self) -> &[Tire] {
        &self.visible
    }

    /// Incremented on every recomputation of [`visible`](Self::visible)
    #[must_use]
    pub const fn visible_revision(&self) -> u64 {
        self.visible_revision
    }

    /// Whether the catalog is loading
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.tires.is_loading()
    }

    /// Message to display: the latest purchase failure, else the load failure
    #[must_use]
    pub fn last_error_message(&self) -> Option<String> {
        self.error_message
            .clone()
            .or_else(|| self.tires.last_error_message())
    }

    /// Sorted distinct brands in the catalog
    #[must_use]
    pub fn available_brands(&self) -> Vec<String> {
        filter::available_brands(self.tires.items())
    }

    /// Observed price range of the catalog
    #[must_use]
    pub fn price_range(&self) -> RangeInclusive<f64> {
        filter::price_range(self.tires.items())
    }

    /// Look a tire up by id
    #[must_use]
    pub fn tire(&self, id: i64) -> Option<&Tire> {
        self.tires.items().iter().find(|tire| tire.id == Some(id))
    }

    /// Phase of the purchase of a tire, if one is tracked
    #[must_use]
    pub fn purchase_phase(&self, tire_id: i64) -> Option<&PurchasePhase> {
        self.purchases.get(&tire_id).map(|attempt| &attempt.phase)
    }

    fn recompute_visible(&mut self) {
        self.visible = apply_filters(self.tires.items(), &self.criteria);
        self.visible_revision += 1;
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Inputs of the catalog screen
#[derive(Debug, Clone)]
pub enum InventoryAction {
    /// Load the catalog, superseding any load in flight
    Load,
    /// Pull-to-refresh; same as `Load`
    Refresh,
    /// Catalog load finished
    TiresLoaded(Result<Vec<Tire>, ErrorKind>),
    /// Edit one filter field (applied after the debounce interval)
    SetFilter(FilterField),
    /// Recompute the visible list from the current criteria
    ApplyFilters,
    /// Restore default criteria and recompute immediately
    ResetFilters,
    /// Buy a set of the tire
    Purchase {
        /// Tire id; `None` for a tire the server sent without one
        tire_id: Option<i64>,
    },
    /// Commit request finished
    OrderCreated {
        /// Tire the order was for
        tire_id: i64,
        /// Order id or classified failure
        result: Result<Option<i64>, ErrorKind>,
    },
    /// The user has seen the purchase outcome
    AcknowledgePurchase {
        /// Tire whose attempt is discarded
        tire_id: i64,
    },
    /// Dismiss the current error message
    DismissError,
}

// ============================================================================
// Environment
// ============================================================================

/// Tunables of the catalog screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventorySettings {
    /// Quiet period before a filter edit is applied
    pub filter_debounce: Duration,
    /// Units per purchase
    pub set_size: u32,
    /// Statuses meaning the server had less stock than cached
    pub conflict_statuses: Vec<u16>,
}

impl From<&ScreenConfig> for InventorySettings {
    fn from(config: &ScreenConfig) -> Self {
        Self {
            filter_debounce: config.filter_debounce,
            set_size: config.purchase_set_size,
            conflict_statuses: config.conflict_statuses.clone(),
        }
    }
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self::from(&AppConfig::default().screens)
    }
}

/// Dependencies of the catalog screen
#[derive(Debug, Clone)]
pub struct InventoryEnvironment {
    /// Backend client
    pub client: ShopClient,
    /// Tunables
    pub settings: InventorySettings,
}

impl InventoryEnvironment {
    /// Creates a new `InventoryEnvironment`
    #[must_use]
    pub const fn new(client: ShopClient, settings: InventorySettings) -> Self {
        Self { client, settings }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer of the catalog screen
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryReducer;

impl InventoryReducer {
    fn load(state: &mut InventoryState, env: &InventoryEnvironment) -> Effect<InventoryAction> {
        state.tires.begin_load();
        let client = env.client.clone();
        Effect::cancellable(
            LOAD_KEY,
            async_effect! {
                Some(InventoryAction::TiresLoaded(client.list_tires().await))
            },
        )
    }

    fn on_loaded(state: &mut InventoryState, result: Result<Vec<Tire>, ErrorKind>) {
        match &result {
            Ok(tires) => tracing::info!(count = tires.len(), "Catalog loaded"),
            Err(error) if error.is_cancelled() => tracing::debug!("Catalog load cancelled"),
            Err(error) => tracing::warn!(error = %error, "Catalog load failed"),
        }

        if state.tires.complete(result) {
            // Untouched price bounds follow the data; text, brand and stock edits survive
            if !state.price_edited {
                state.criteria.set_price_range(filter::price_range(state.tires.items()));
            }
            // Data refreshes apply at once; only criteria edits are debounced
            state.recompute_visible();
        }
    }

    fn purchase(
        state: &mut InventoryState,
        tire_id: Option<i64>,
        env: &InventoryEnvironment,
    ) -> SmallVec<[Effect<InventoryAction>; 4]> {
        let Some((id, tire)) = tire_id.and_then(|id| state.tire(id).map(|tire| (id, tire.clone()))) else {
            tracing::warn!(?tire_id, "Purchase of unknown item");
            state.error_message = Some(LocalRejection::InvalidItem.to_string());
            return smallvec![Effect::None];
        };

        let set_size = env.settings.set_size;
        let in_flight = state.purchase_phase(id) == Some(&PurchasePhase::Submitting);

        if let Err(reason) = check_local(&tire, set_size, in_flight) {
            if reason == LocalRejection::AlreadySubmitting {
                tracing::debug!(tire_id = id, "Purchase already in flight");
                return smallvec![Effect::None];
            }
            tracing::info!(tire_id = id, %reason, "Purchase rejected locally");
            state.error_message = Some(reason.to_string());
            state.purchases.insert(
                id,
                PurchaseAttempt {
                    item_id: id,
                    requested_quantity: set_size,
                    item_name: purchase::item_name(&tire),
                    phase: PurchasePhase::RejectedLocal(reason),
                },
            );
            return smallvec![Effect::None];
        }

        state.error_message = None;
        state.purchased_item = None;
        state.purchases.insert(
            id,
            PurchaseAttempt {
                item_id: id,
                requested_quantity: set_size,
                item_name: purchase::item_name(&tire),
                phase: PurchasePhase::Submitting,
            },
        );
        metrics::counter!("inventory.purchases.submitted").increment(1);
        tracing::debug!(tire_id = id, quantity = set_size, "Submitting purchase");

        let client = env.client.clone();
        smallvec![Effect::cancellable(
            purchase_key(id),
            async_effect! {
                Some(InventoryAction::OrderCreated {
                    tire_id: id,
                    result: client.create_order(id, set_size).await,
                })
            },
        )]
    }

    fn order_created(
        state: &mut InventoryState,
        tire_id: i64,
        result: &Result<Option<i64>, ErrorKind>,
        env: &InventoryEnvironment,
    ) -> SmallVec<[Effect<InventoryAction>; 4]> {
        let Some(attempt) = state.purchases.get_mut(&tire_id) else {
            return smallvec![Effect::None];
        };
        if attempt.phase.is_terminal() {
            return smallvec![Effect::None];
        }

        let Some(phase) = resolve(result.as_ref().copied(), &env.settings.conflict_statuses) else {
            tracing::debug!(tire_id, "Purchase cancelled");
            state.purchases.remove(&tire_id);
            return smallvec![Effect::None];
        };

        match &phase {
            PurchasePhase::Committed { order_id } => {
                tracing::info!(tire_id, ?order_id, "Purchase committed");
                metrics::counter!("inventory.purchases.completed", "outcome" => "committed").increment(1);
                state.purchased_item = Some(attempt.item_name.clone());
            },
            PurchasePhase::RejectedStock => {
                tracing::warn!(tire_id, "Purchase rejected: stock conflict, reloading catalog");
                metrics::counter!("inventory.purchases.completed", "outcome" => "rejected_stock").increment(1);
                state.error_message = Some(INSUFFICIENT_STOCK_MESSAGE.to_string());
            },
            PurchasePhase::RejectedOther { message } => {
                tracing::warn!(tire_id, %message, "Purchase failed");
                metrics::counter!("inventory.purchases.completed", "outcome" => "rejected_other").increment(1);
                state.error_message = Some(message.clone());
            },
            PurchasePhase::RejectedLocal(_) | PurchasePhase::Submitting => {},
        }

        let reload = phase.requires_reload();
        attempt.phase = phase;

        if reload {
            smallvec![Self::load(state, env)]
        } else {
            smallvec![Effect::None]
        }
    }
}

impl Reducer for InventoryReducer {
    type State = InventoryState;
    type Action = InventoryAction;
    type Environment = InventoryEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            InventoryAction::Load | InventoryAction::Refresh => {
                state.error_message = None;
                smallvec![Self::load(state, env)]
            },
            InventoryAction::TiresLoaded(result) => {
                Self::on_loaded(state, result);
                smallvec![Effect::None]
            },
            InventoryAction::SetFilter(field) => {
                if field.is_price_bound() {
                    state.price_edited = true;
                }
                state.criteria.apply(field);
                smallvec![Effect::debounce(
                    FILTER_KEY,
                    env.settings.filter_debounce,
                    InventoryAction::ApplyFilters,
                )]
            },
            InventoryAction::ApplyFilters => {
                state.recompute_visible();
                smallvec![Effect::None]
            },
            InventoryAction::ResetFilters => {
                state.criteria = FilterCriteria::defaults_for(state.tires.items());
                state.price_edited = false;
                state.recompute_visible();
                // A pending debounced recompute would only repeat this one
                smallvec![Effect::cancel(FILTER_KEY)]
            },
            InventoryAction::Purchase { tire_id } => Self::purchase(state, tire_id, env),
            InventoryAction::OrderCreated { tire_id, result } => {
                Self::order_created(state, tire_id, &result, env)
            },
            InventoryAction::AcknowledgePurchase { tire_id } => {
                if state.purchase_phase(tire_id).is_some_and(PurchasePhase::is_terminal) {
                    state.purchases.remove(&tire_id);
                    state.purchased_item = None;
                    state.error_message = None;
                }
                smallvec![Effect::None]
            },
            InventoryAction::DismissError => {
                state.error_message = None;
                state.tires.clear_error();
                smallvec![Effect::None]
            },
        }
    }
}
