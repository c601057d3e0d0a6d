//! Server-backed collection state.

use crate::classify::ErrorKind;

/// State of one remote query on one screen.
///
/// Holds the server truth in server order, the loading flag and the last
/// classified error. Only the owning reducer mutates it, and only in response
/// to starting or completing a remote call.
#[derive(Debug, Clone)]
pub struct RemoteCollectionState<T> {
    items: Vec<T>,
    is_loading: bool,
    last_error: Option<ErrorKind>,
}

impl<T> Default for RemoteCollectionState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            is_loading: false,
            last_error: None,
        }
    }
}

impl<T> RemoteCollectionState<T> {
    /// Create an empty collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection that already holds `items`
    #[must_use]
    pub const fn with_items(items: Vec<T>) -> Self {
        Self {
            items,
            is_loading: false,
            last_error: None,
        }
    }

    /// Items in server order
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Whether a load is in flight
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Last classified failure, if the previous load failed
    #[must_use]
    pub const fn last_error(&self) -> Option<&ErrorKind> {
        self.last_error.as_ref()
    }

    /// Display text for the last failure
    #[must_use]
    pub fn last_error_message(&self) -> Option<String> {
        self.last_error.as_ref().and_then(ErrorKind::user_message)
    }

    /// Mark a load as started and clear the previous error
    pub fn begin_load(&mut self) {
        self.is_loading = true;
        self.last_error = None;
    }

    /// Like [`begin_load`](Self::begin_load), but also drop the current items
    pub fn begin_fresh_load(&mut self) {
        self.items.clear();
        self.begin_load();
    }

    /// Apply the result of a load.
    ///
    /// Cancellations are absorbed without touching items or error. Returns
    /// `true` when the items were replaced.
    pub fn complete(&mut self, result: Result<Vec<T>, ErrorKind>) -> bool {
        self.is_loading = false;
        match result {
            Ok(items) => {
                self.items = items;
                self.last_error = None;
                true
            },
            Err(error) => {
                self.fail(error);
                false
            },
        }
    }

    /// Record a failure unless it is a cancellation
    pub fn fail(&mut self, error: ErrorKind) {
        self.is_loading = false;
        if !error.is_cancelled() {
            self.last_error = Some(error);
        }
    }

    /// Dismiss the current error
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Mutable access to the items for in-place presentation sorting
    pub fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}
