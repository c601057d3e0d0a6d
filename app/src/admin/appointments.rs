//! Appointments of one day, for the administrator dashboard.

use super::AdminEnvironment;
use chrono::{NaiveDate, NaiveDateTime};
use pitstop_core::classify::ErrorKind;
use pitstop_core::collection::RemoteCollectionState;
use pitstop_core::grouping::{DayBucket, Scheduled, bucket_by_day, sort_within_day};
use pitstop_core::{SmallVec, async_effect, effect::Effect, reducer::Reducer, smallvec};
use serde::{Deserialize, Serialize};

/// Single-flight key of the appointment load
pub const LOAD_KEY: &str = "load-appointments";

/// One booked appointment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Server id
    pub id: Option<i64>,
    /// Local start time
    #[serde(default, with = "crate::dates::optional")]
    pub start_time: Option<NaiveDateTime>,
    /// Client display name
    pub client_name: Option<String>,
    /// Client phone as typed at booking
    pub client_phone: Option<String>,
    /// Booked service
    pub service_name: Option<String>,
    /// Free-text comment
    pub comment: Option<String>,
    /// Server-side status
    pub status: Option<String>,
}

impl Appointment {
    /// `tel:` link for the client's phone
    #[must_use]
    pub fn dial_uri(&self) -> Option<String> {
        self.client_phone.as_deref().and_then(dial_uri)
    }
}

impl Scheduled for Appointment {
    fn start_time(&self) -> Option<NaiveDateTime> {
        self.start_time
    }
}

/// Appointments sharing a calendar day
pub type AppointmentBucket = DayBucket<Appointment>;

/// Normalise a phone number to a `tel:` URI.
///
/// Keeps a leading `+` and the digits; `None` when there are no digits.
#[must_use]
pub fn dial_uri(phone: &str) -> Option<String> {
    let phone = phone.trim();
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let plus = if phone.starts_with('+') { "+" } else { "" };
    Some(format!("tel:{plus}{digits}"))
}

/// Dashboard state
#[derive(Debug, Clone, Default)]
pub struct AppointmentsState {
    selected_date: Option<NaiveDate>,
    /// Appointments of the selected day, sorted by start time
    pub appointments: RemoteCollectionState<Appointment>,
    buckets: Vec<AppointmentBucket>,
}

impl AppointmentsState {
    /// State for a given day
    #[must_use]
    pub fn for_day(day: NaiveDate) -> Self {
        Self {
            selected_date: Some(day),
            ..Self::default()
        }
    }

    /// Day being shown; `None` until the first load picks today
    #[must_use]
    pub const fn selected_date(&self) -> Option<NaiveDate> {
        self.selected_date
    }

    /// Appointments grouped by day, days ascending
    #[must_use]
    pub fn buckets(&self) -> &[AppointmentBucket] {
        &self.buckets
    }
}

/// Dashboard inputs
#[derive(Debug, Clone)]
pub enum AppointmentsAction {
    /// Load the selected day (today if none selected yet)
    Load,
    /// Reload the selected day, keeping the list until the answer arrives
    Refresh,
    /// Show another day
    SelectDate(NaiveDate),
    /// Appointment load finished
    Loaded(Result<Vec<Appointment>, ErrorKind>),
    /// Dismiss the current error message
    DismissError,
}

/// Reducer of the appointments dashboard
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentsReducer;

impl AppointmentsReducer {
    fn load(
        state: &mut AppointmentsState,
        env: &AdminEnvironment,
        clear: bool,
    ) -> SmallVec<[Effect<AppointmentsAction>; 4]> {
        if !env.authorize(LOAD_KEY) {
            return smallvec![Effect::None];
        }

        let day = *state.selected_date.get_or_insert_with(|| env.clock.today());
        if clear {
            state.appointments.begin_fresh_load();
            state.buckets.clear();
        } else {
            state.appointments.begin_load();
        }

        tracing::debug!(%day, "Loading appointments");
        let client = env.client.clone();
        smallvec![Effect::cancellable(
            LOAD_KEY,
            async_effect! {
                Some(AppointmentsAction::Loaded(client.admin_appointments(day).await))
            },
        )]
    }
}

impl Reducer for AppointmentsReducer {
    type State = AppointmentsState;
    type Action = AppointmentsAction;
    type Environment = AdminEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            AppointmentsAction::Load => Self::load(state, env, true),
            AppointmentsAction::Refresh => Self::load(state, env, false),
            AppointmentsAction::SelectDate(day) => {
                state.selected_date = Some(day);
                Self::load(state, env, true)
            },
            AppointmentsAction::Loaded(result) => {
                match &result {
                    Ok(items) => tracing::info!(count = items.len(), "Appointments loaded"),
                    Err(error) if error.is_cancelled() => tracing::debug!("Appointment load cancelled"),
                    Err(error) => tracing::warn!(error = %error, "Appointment load failed"),
                }
                if state.appointments.complete(result) {
                    sort_within_day(state.appointments.items_mut());
                    state.buckets = bucket_by_day(state.appointments.items());
                }
                smallvec![Effect::None]
            },
            AppointmentsAction::DismissError => {
                state.appointments.clear_error();
                smallvec![Effect::None]
            },
        }
    }
}
