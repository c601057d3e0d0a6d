//! Order list for administrators.

use super::AdminEnvironment;
use chrono::NaiveDateTime;
use pitstop_core::classify::ErrorKind;
use pitstop_core::collection::RemoteCollectionState;
use pitstop_core::{SmallVec, async_effect, effect::Effect, reducer::Reducer, smallvec};
use serde::{Deserialize, Serialize};

/// Single-flight key of the order load
pub const LOAD_KEY: &str = "load-orders";

/// One customer order as the administrator sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOrder {
    /// Server id
    pub id: Option<i64>,
    /// Customer display name
    pub client_name: Option<String>,
    /// Customer phone
    pub client_phone: Option<String>,
    /// Human-readable list of ordered items
    pub items_summary: Option<String>,
    /// Order total
    pub total_price: Option<f64>,
    /// Server-side status
    pub status: Option<String>,
    /// Local creation time
    #[serde(default, with = "crate::dates::optional")]
    pub created_at: Option<NaiveDateTime>,
}

/// Order list state
#[derive(Debug, Clone, Default)]
pub struct OrdersState {
    /// Orders in server order
    pub orders: RemoteCollectionState<AdminOrder>,
}

/// Order list inputs
#[derive(Debug, Clone)]
pub enum OrdersAction {
    /// Load (or reload) the orders
    Load,
    /// Order load finished
    Loaded(Result<Vec<AdminOrder>, ErrorKind>),
    /// Dismiss the current error message
    DismissError,
}

/// Reducer of the order list
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdersReducer;

impl Reducer for OrdersReducer {
    type State = OrdersState;
    type Action = OrdersAction;
    type Environment = AdminEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            OrdersAction::Load => {
                if !env.authorize(LOAD_KEY) {
                    return smallvec![Effect::None];
                }
                state.orders.begin_load();
                let client = env.client.clone();
                smallvec![Effect::cancellable(
                    LOAD_KEY,
                    async_effect! { Some(OrdersAction::Loaded(client.admin_orders().await)) },
                )]
            },
            OrdersAction::Loaded(result) => {
                match &result {
                    Ok(orders) => tracing::info!(count = orders.len(), "Orders loaded"),
                    Err(error) if error.is_cancelled() => tracing::debug!("Order load cancelled"),
                    Err(error) => tracing::warn!(error = %error, "Order load failed"),
                }
                state.orders.complete(result);
                smallvec![Effect::None]
            },
            OrdersAction::DismissError => {
                state.orders.clear_error();
                smallvec![Effect::None]
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ShopClient;
    use pitstop_testing::{MockSession, MockTransport, ReducerTest, assertions};
    use std::sync::Arc;

    fn env(session: MockSession) -> AdminEnvironment {
        AdminEnvironment::new(ShopClient::new(Arc::new(MockTransport::new())), Arc::new(session))
    }

    #[test]
    fn admin_load_is_keyed() {
        ReducerTest::new(OrdersReducer)
            .with_env(env(MockSession::admin()))
            .given_state(OrdersState::default())
            .when_action(OrdersAction::Load)
            .then_state(|state| assert!(state.orders.is_loading()))
            .then_effects(|effects| assertions::assert_has_cancellable_effect(effects, LOAD_KEY))
            .run();
    }

    #[test]
    fn anonymous_load_is_refused() {
        ReducerTest::new(OrdersReducer)
            .with_env(env(MockSession::anonymous()))
            .given_state(OrdersState::default())
            .when_action(OrdersAction::Load)
            .then_state(|state| assert!(!state.orders.is_loading()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn failure_surfaces_the_server_message() {
        ReducerTest::new(OrdersReducer)
            .with_env(env(MockSession::admin()))
            .given_state(OrdersState::default())
            .when_action(OrdersAction::Loaded(Err(ErrorKind::ServerRejected {
                status_code: 403,
                message: Some("access denied".to_string()),
            })))
            .then_state(|state| {
                assert_eq!(state.orders.last_error_message().as_deref(), Some("access denied"));
            })
            .run();
    }

    #[test]
    fn orders_decode_from_backend_shape() {
        let orders: Vec<AdminOrder> =
            serde_json::from_value(pitstop_testing::fixtures::list(&[pitstop_testing::fixtures::order(
                5,
                "4 x Michelin Pilot Sport 4",
                34_000.0,
            )]))
            .unwrap();

        assert_eq!(orders[0].items_summary.as_deref(), Some("4 x Michelin Pilot Sport 4"));
        assert_eq!(orders[0].total_price, Some(34_000.0));
        assert!(orders[0].created_at.is_some());
    }
}
