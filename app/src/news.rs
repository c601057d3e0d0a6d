//! News feed and the administrator's news composer.

use crate::client::ShopClient;
use chrono::NaiveDateTime;
use pitstop_core::classify::ErrorKind;
use pitstop_core::collection::RemoteCollectionState;
use pitstop_core::environment::Session;
use pitstop_core::{SmallVec, async_effect, effect::Effect, reducer::Reducer, smallvec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Single-flight key of the feed load
pub const LOAD_KEY: &str = "load-news";

/// Single-flight key of a publication
pub const PUBLISH_KEY: &str = "publish-news";

// ============================================================================
// Model
// ============================================================================

/// One published news item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    /// Server id
    pub id: Option<i64>,
    /// Headline
    pub title: Option<String>,
    /// Body text
    pub content: Option<String>,
    /// Illustration
    pub image_url: Option<String>,
    /// Local publication time
    #[serde(default, with = "crate::dates::optional")]
    pub created_at: Option<NaiveDateTime>,
}

/// Body of a publication request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsDraft {
    /// Headline
    pub title: String,
    /// Body text
    pub content: String,
    /// Illustration; omitted from the request when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Dependencies of the news screens
#[derive(Clone)]
pub struct NewsEnvironment {
    /// Backend client
    pub client: ShopClient,
    /// Signed-in identity
    pub session: Arc<dyn Session>,
}

impl NewsEnvironment {
    /// Creates a new `NewsEnvironment`
    #[must_use]
    pub fn new(client: ShopClient, session: Arc<dyn Session>) -> Self {
        Self { client, session }
    }
}

impl std::fmt::Debug for NewsEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsEnvironment")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Feed
// ============================================================================

/// News feed state
#[derive(Debug, Clone, Default)]
pub struct NewsState {
    /// Items in server order
    pub news: RemoteCollectionState<NewsItem>,
}

/// News feed inputs
#[derive(Debug, Clone)]
pub enum NewsAction {
    /// Load the feed
    Load,
    /// Pull-to-refresh; same as `Load`
    Refresh,
    /// Feed load finished
    Loaded(Result<Vec<NewsItem>, ErrorKind>),
    /// Dismiss the current error message
    DismissError,
}

/// Reducer of the news feed
#[derive(Debug, Clone, Copy, Default)]
pub struct NewsReducer;

impl Reducer for NewsReducer {
    type State = NewsState;
    type Action = NewsAction;
    type Environment = NewsEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            NewsAction::Load | NewsAction::Refresh => {
                state.news.begin_load();
                let client = env.client.clone();
                smallvec![Effect::cancellable(
                    LOAD_KEY,
                    async_effect! { Some(NewsAction::Loaded(client.list_news().await)) },
                )]
            },
            NewsAction::Loaded(result) => {
                match &result {
                    Ok(items) => tracing::info!(count = items.len(), "News loaded"),
                    Err(error) if error.is_cancelled() => tracing::debug!("News load cancelled"),
                    Err(error) => tracing::warn!(error = %error, "News load failed"),
                }
                state.news.complete(result);
                smallvec![Effect::None]
            },
            NewsAction::DismissError => {
                state.news.clear_error();
                smallvec![Effect::None]
            },
        }
    }
}

// ============================================================================
// Composer
// ============================================================================

/// Composer form state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposerState {
    /// Headline being typed
    pub title: String,
    /// Body being typed
    pub content: String,
    /// Optional illustration URL being typed
    pub image_url: String,
    is_publishing: bool,
    published: bool,
    error_message: Option<String>,
}

impl ComposerState {
    /// Whether the form can be published
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.title.trim().is_empty() && !self.content.trim().is_empty()
    }

    /// Whether a publication is in flight
    #[must_use]
    pub const fn is_publishing(&self) -> bool {
        self.is_publishing
    }

    /// Whether the last publication succeeded and has not been dismissed
    #[must_use]
    pub const fn published(&self) -> bool {
        self.published
    }

    /// Message of the last failed publication
    #[must_use]
    pub fn last_error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Request body for the current form
    #[must_use]
    pub fn draft(&self) -> NewsDraft {
        let image_url = self.image_url.trim();
        NewsDraft {
            title: self.title.trim().to_string(),
            content: self.content.trim().to_string(),
            image_url: (!image_url.is_empty()).then(|| image_url.to_string()),
        }
    }
}

/// Composer inputs
#[derive(Debug, Clone)]
pub enum ComposerAction {
    /// Edit the headline
    SetTitle(String),
    /// Edit the body
    SetContent(String),
    /// Edit the illustration URL
    SetImageUrl(String),
    /// Publish the form
    Publish,
    /// Publication finished
    Published(Result<(), ErrorKind>),
    /// Hide the success notice
    DismissSuccess,
    /// Dismiss the current error message
    DismissError,
}

/// Reducer of the news composer
#[derive(Debug, Clone, Copy, Default)]
pub struct ComposerReducer;

impl Reducer for ComposerReducer {
    type State = ComposerState;
    type Action = ComposerAction;
    type Environment = NewsEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            ComposerAction::SetTitle(title) => state.title = title,
            ComposerAction::SetContent(content) => state.content = content,
            ComposerAction::SetImageUrl(url) => state.image_url = url,
            ComposerAction::Publish => {
                if !env.session.is_admin() {
                    tracing::warn!(operation = PUBLISH_KEY, "Refusing admin operation for non-admin session");
                    return smallvec![Effect::None];
                }
                if state.is_publishing || !state.is_valid() {
                    tracing::debug!(publishing = state.is_publishing, "Publish ignored");
                    return smallvec![Effect::None];
                }

                state.is_publishing = true;
                state.published = false;
                state.error_message = None;

                let client = env.client.clone();
                let draft = state.draft();
                return smallvec![Effect::cancellable(
                    PUBLISH_KEY,
                    async_effect! { Some(ComposerAction::Published(client.create_news(&draft).await)) },
                )];
            },
            ComposerAction::Published(result) => {
                state.is_publishing = false;
                match result {
                    Ok(()) => {
                        tracing::info!(title = %state.title, "News published");
                        state.title.clear();
                        state.content.clear();
                        state.image_url.clear();
                        state.published = true;
                    },
                    Err(error) if error.is_cancelled() => tracing::debug!("Publication cancelled"),
                    Err(error) => {
                        tracing::warn!(error = %error, "Publication failed");
                        state.error_message = error.user_message();
                    },
                }
            },
            ComposerAction::DismissSuccess => state.published = false,
            ComposerAction::DismissError => state.error_message = None,
        }
        SmallVec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitstop_testing::{MockSession, MockTransport, ReducerTest, assertions};

    fn env(session: MockSession) -> NewsEnvironment {
        NewsEnvironment::new(ShopClient::new(Arc::new(MockTransport::new())), Arc::new(session))
    }

    fn filled() -> ComposerState {
        ComposerState {
            title: "Winter season".to_string(),
            content: "Studded tires are back.".to_string(),
            ..ComposerState::default()
        }
    }

    #[test]
    fn feed_load_is_keyed() {
        ReducerTest::new(NewsReducer)
            .with_env(env(MockSession::customer()))
            .given_state(NewsState::default())
            .when_action(NewsAction::Refresh)
            .then_state(|state| assert!(state.news.is_loading()))
            .then_effects(|effects| assertions::assert_has_cancellable_effect(effects, LOAD_KEY))
            .run();
    }

    #[test]
    fn draft_omits_empty_image() {
        let draft = filled().draft();
        assert_eq!(draft.image_url, None);
        assert_eq!(
            serde_json::to_value(&draft).unwrap(),
            serde_json::json!({ "title": "Winter season", "content": "Studded tires are back." })
        );
    }

    #[test]
    fn validity_needs_title_and_content() {
        assert!(filled().is_valid());
        assert!(!ComposerState { content: "  ".to_string(), ..filled() }.is_valid());
        assert!(!ComposerState::default().is_valid());
    }

    #[test]
    fn publish_schedules_single_flight() {
        ReducerTest::new(ComposerReducer)
            .with_env(env(MockSession::admin()))
            .given_state(filled())
            .when_action(ComposerAction::Publish)
            .then_state(|state| assert!(state.is_publishing()))
            .then_effects(|effects| assertions::assert_has_cancellable_effect(effects, PUBLISH_KEY))
            .run();
    }

    #[test]
    fn publish_while_publishing_is_ignored() {
        let mut state = filled();
        let _ = ComposerReducer.reduce(&mut state, ComposerAction::Publish, &env(MockSession::admin()));

        ReducerTest::new(ComposerReducer)
            .with_env(env(MockSession::admin()))
            .given_state(state)
            .when_action(ComposerAction::Publish)
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn customer_cannot_publish() {
        ReducerTest::new(ComposerReducer)
            .with_env(env(MockSession::customer()))
            .given_state(filled())
            .when_action(ComposerAction::Publish)
            .then_state(|state| assert!(!state.is_publishing()))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn success_clears_the_form() {
        let mut state = filled();
        state.is_publishing = true;

        ReducerTest::new(ComposerReducer)
            .with_env(env(MockSession::admin()))
            .given_state(state)
            .when_action(ComposerAction::Published(Ok(())))
            .then_state(|state| {
                assert!(state.published());
                assert!(state.title.is_empty() && state.content.is_empty());
                assert!(!state.is_publishing());
            })
            .run();
    }

    #[test]
    fn failure_keeps_the_form_and_reports() {
        let mut state = filled();
        state.is_publishing = true;

        ReducerTest::new(ComposerReducer)
            .with_env(env(MockSession::admin()))
            .given_state(state)
            .when_action(ComposerAction::Published(Err(ErrorKind::ServerRejected {
                status_code: 400,
                message: Some("title too long".to_string()),
            })))
            .then_state(|state| {
                assert_eq!(state.last_error_message(), Some("title too long"));
                assert_eq!(state.title, "Winter season");
                assert!(!state.published());
            })
            .run();
    }
}
