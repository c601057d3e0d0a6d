//! Slot selection and booking for one service.
//!
//! Like a purchase, a booking is checked locally against the cached slot
//! list, and a conflict answer from the server means that list was stale:
//! the slots are reloaded.

use crate::client::ShopClient;
use chrono::{NaiveDate, NaiveDateTime};
use pitstop_core::classify::ErrorKind;
use pitstop_core::collection::RemoteCollectionState;
use pitstop_core::environment::{Clock, SystemClock};
use pitstop_core::{SmallVec, async_effect, effect::Effect, reducer::Reducer, smallvec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Single-flight key of the slot load
pub const LOAD_KEY: &str = "load-slots";

/// Single-flight key of the booking request
pub const BOOK_KEY: &str = "create-booking";

/// Time of day of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTime {
    /// Hour, 0-23
    pub hour: Option<u32>,
    /// Minute, 0-59
    pub minute: Option<u32>,
}

/// One bookable slot of the selected day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    /// Start time of day
    pub time: Option<SlotTime>,
    /// Whether the slot is free
    pub is_available: Option<bool>,
}

impl TimeSlot {
    /// Start of the slot on `day`; missing hour or minute count as zero
    #[must_use]
    pub fn start_on(&self, day: NaiveDate) -> Option<NaiveDateTime> {
        let time = self.time?;
        day.and_hms_opt(time.hour.unwrap_or(0), time.minute.unwrap_or(0), 0)
    }

    /// Whether the slot is known to be free
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.is_available == Some(true)
    }
}

/// Reasons a booking is refused without a network call
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingRejection {
    /// No slot selected, or the selection no longer exists
    #[error("please select a time")]
    NoSelection,
    /// The selected slot is not free
    #[error("this time is already taken")]
    SlotTaken,
    /// The selected slot has no usable time
    #[error("could not compose start time")]
    NoStartTime,
}

// ============================================================================
// State
// ============================================================================

/// Booking screen state
#[derive(Debug, Clone, Default)]
pub struct BookingState {
    /// Service being booked
    pub service_id: i64,
    /// Display name of the service
    pub service_name: String,
    selected_date: Option<NaiveDate>,
    /// Slots of the selected day
    pub slots: RemoteCollectionState<TimeSlot>,
    selected_slot: Option<usize>,
    is_booking: bool,
    booked: bool,
    error_message: Option<String>,
}

impl BookingState {
    /// State for booking `service_id`
    #[must_use]
    pub fn new(service_id: i64, service_name: impl Into<String>) -> Self {
        Self {
            service_id,
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    /// Day being shown; `None` until the first load picks today
    #[must_use]
    pub const fn selected_date(&self) -> Option<NaiveDate> {
        self.selected_date
    }

    /// Index of the selected slot
    #[must_use]
    pub const fn selected_slot(&self) -> Option<usize> {
        self.selected_slot
    }

    /// Whether a booking request is in flight
    #[must_use]
    pub const fn is_booking(&self) -> bool {
        self.is_booking
    }

    /// Whether the last booking succeeded and has not been dismissed
    #[must_use]
    pub const fn booked(&self) -> bool {
        self.booked
    }

    /// Message to display: the booking failure, else the slot load failure
    #[must_use]
    pub fn last_error_message(&self) -> Option<String> {
        self.error_message
            .clone()
            .or_else(|| self.slots.last_error_message())
    }

    /// Start time the current selection would book.
    ///
    /// # Errors
    ///
    /// Returns the [`BookingRejection`] that prevents booking.
    pub fn validate(&self) -> Result<NaiveDateTime, BookingRejection> {
        let slot = self
            .selected_slot
            .and_then(|index| self.slots.items().get(index))
            .ok_or(BookingRejection::NoSelection)?;
        if !slot.is_available() {
            return Err(BookingRejection::SlotTaken);
        }
        self.selected_date
            .and_then(|day| slot.start_on(day))
            .ok_or(BookingRejection::NoStartTime)
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Booking screen inputs
#[derive(Debug, Clone)]
pub enum BookingAction {
    /// Load slots of the selected day (today if none selected yet)
    LoadSlots,
    /// Show another day
    SelectDate(NaiveDate),
    /// Slot load finished
    SlotsLoaded(Result<Vec<TimeSlot>, ErrorKind>),
    /// Select a slot by position
    SelectSlot(usize),
    /// Book the selected slot
    Book,
    /// Booking request finished
    Booked(Result<(), ErrorKind>),
    /// Hide the success notice
    DismissSuccess,
    /// Dismiss the current error message
    DismissError,
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the booking screen
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Backend client
    pub client: ShopClient,
    /// Source of "today"
    pub clock: Arc<dyn Clock>,
    /// Statuses meaning the slot list was stale
    pub conflict_statuses: Vec<u16>,
}

impl BookingEnvironment {
    /// Creates a new `BookingEnvironment` on the system clock
    #[must_use]
    pub fn new(client: ShopClient, conflict_statuses: Vec<u16>) -> Self {
        Self {
            client,
            clock: Arc::new(SystemClock),
            conflict_statuses,
        }
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl std::fmt::Debug for BookingEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingEnvironment")
            .field("client", &self.client)
            .field("conflict_statuses", &self.conflict_statuses)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer of the booking screen
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingReducer;

impl BookingReducer {
    fn load_slots(state: &mut BookingState, env: &BookingEnvironment) -> Effect<BookingAction> {
        let day = *state.selected_date.get_or_insert_with(|| env.clock.today());
        state.slots.begin_fresh_load();
        state.selected_slot = None;

        let client = env.client.clone();
        let service_id = state.service_id;
        Effect::cancellable(
            LOAD_KEY,
            async_effect! {
                Some(BookingAction::SlotsLoaded(client.list_slots(day, service_id).await))
            },
        )
    }

    fn book(state: &mut BookingState, env: &BookingEnvironment) -> SmallVec<[Effect<BookingAction>; 4]> {
        if state.is_booking {
            tracing::debug!("Booking already in flight");
            return smallvec![Effect::None];
        }

        let start = match state.validate() {
            Ok(start) => start,
            Err(reason) => {
                tracing::info!(%reason, "Booking rejected locally");
                state.error_message = Some(reason.to_string());
                return smallvec![Effect::None];
            },
        };

        state.is_booking = true;
        state.booked = false;
        state.error_message = None;
        tracing::debug!(service_id = state.service_id, %start, "Submitting booking");

        let client = env.client.clone();
        let service_id = state.service_id;
        smallvec![Effect::cancellable(
            BOOK_KEY,
            async_effect! {
                Some(BookingAction::Booked(client.create_booking(service_id, start).await))
            },
        )]
    }

    fn booked(
        state: &mut BookingState,
        result: Result<(), ErrorKind>,
        env: &BookingEnvironment,
    ) -> SmallVec<[Effect<BookingAction>; 4]> {
        state.is_booking = false;
        match result {
            Ok(()) => {
                tracing::info!(service_id = state.service_id, "Booking confirmed");
                state.booked = true;
                smallvec![Effect::None]
            },
            Err(error) if error.is_cancelled() => {
                tracing::debug!("Booking cancelled");
                smallvec![Effect::None]
            },
            Err(error) => {
                state.error_message = error.user_message();
                if error
                    .status_code()
                    .is_some_and(|code| env.conflict_statuses.contains(&code))
                {
                    tracing::warn!(error = %error, "Booking conflict, reloading slots");
                    smallvec![Self::load_slots(state, env)]
                } else {
                    tracing::warn!(error = %error, "Booking failed");
                    smallvec![Effect::None]
                }
            },
        }
    }
}

impl Reducer for BookingReducer {
    type State = BookingState;
    type Action = BookingAction;
    type Environment = BookingEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            BookingAction::LoadSlots => smallvec![Self::load_slots(state, env)],
            BookingAction::SelectDate(day) => {
                state.selected_date = Some(day);
                smallvec![Self::load_slots(state, env)]
            },
            BookingAction::SlotsLoaded(result) => {
                match &result {
                    Ok(slots) => tracing::info!(count = slots.len(), "Slots loaded"),
                    Err(error) if error.is_cancelled() => tracing::debug!("Slot load cancelled"),
                    Err(error) => tracing::warn!(error = %error, "Slot load failed"),
                }
                state.slots.complete(result);
                smallvec![Effect::None]
            },
            BookingAction::SelectSlot(index) => {
                state.selected_slot = Some(index);
                smallvec![Effect::None]
            },
            BookingAction::Book => Self::book(state, env),
            BookingAction::Booked(result) => Self::booked(state, result, env),
            BookingAction::DismissSuccess => {
                state.booked = false;
                smallvec![Effect::None]
            },
            BookingAction::DismissError => {
                state.error_message = None;
                state.slots.clear_error();
                smallvec![Effect::None]
            },
        }
    }
}
