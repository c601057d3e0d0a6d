//! Typed access to the shop backend.
//!
//! [`ShopClient`] is the one place where raw transport failures are
//! classified: every method returns `Result<_, ErrorKind>`, and nothing
//! downstream ever sees a [`TransportFailure`](pitstop_core::transport::TransportFailure).

use crate::admin::appointments::Appointment;
use crate::admin::orders::AdminOrder;
use crate::booking::TimeSlot;
use crate::dates::{format_query_date, format_server_datetime};
use crate::inventory::Tire;
use crate::news::{NewsDraft, NewsItem};
use chrono::{NaiveDate, NaiveDateTime};
use pitstop_core::classify::{ErrorKind, classify, classify_decode};
use pitstop_core::transport::{ApiRequest, Endpoint, Transport};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

/// Cloneable handle over a [`Transport`]
#[derive(Clone)]
pub struct ShopClient {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ShopClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopClient").finish_non_exhaustive()
    }
}

impl ShopClient {
    /// Wrap a transport
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Execute a request and classify any failure
    async fn send(&self, request: ApiRequest) -> Result<Value, ErrorKind> {
        let endpoint = request.endpoint;
        self.transport.call(request).await.map_err(|failure| {
            let kind = classify(failure);
            if kind.is_cancelled() {
                tracing::debug!(%endpoint, "Request cancelled");
            } else {
                tracing::debug!(%endpoint, error = %kind, "Request failed");
            }
            kind
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ErrorKind> {
        let body = self.send(request).await?;
        serde_json::from_value(body).map_err(classify_decode)
    }

    /// `GET /api/tires`
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the call.
    pub async fn list_tires(&self) -> Result<Vec<Tire>, ErrorKind> {
        self.fetch(ApiRequest::new(Endpoint::ListTires)).await
    }

    /// `POST /api/orders` for `quantity` units of one tire.
    ///
    /// Returns the order id when the server reports one.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the call.
    pub async fn create_order(&self, tire_id: i64, quantity: u32) -> Result<Option<i64>, ErrorKind> {
        // Item ids are JSON object keys, so they travel as strings
        let request = ApiRequest::new(Endpoint::CreateOrder)
            .with_json(&json!({ "items": { (tire_id.to_string()): quantity } }))
            .map_err(classify_decode)?;
        let body = self.send(request).await?;
        Ok(body.as_i64())
    }

    /// `GET /api/admin/orders`
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the call.
    pub async fn admin_orders(&self) -> Result<Vec<AdminOrder>, ErrorKind> {
        self.fetch(ApiRequest::new(Endpoint::AdminOrders)).await
    }

    /// `GET /api/admin/appointments?date=`
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the call.
    pub async fn admin_appointments(&self, day: NaiveDate) -> Result<Vec<Appointment>, ErrorKind> {
        self.fetch(ApiRequest::new(Endpoint::AdminAppointments).with_query("date", format_query_date(day)))
            .await
    }

    /// `GET /api/news`
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the call.
    pub async fn list_news(&self) -> Result<Vec<NewsItem>, ErrorKind> {
        self.fetch(ApiRequest::new(Endpoint::ListNews)).await
    }

    /// `POST /api/news`
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the call.
    pub async fn create_news(&self, draft: &NewsDraft) -> Result<(), ErrorKind> {
        let request = ApiRequest::new(Endpoint::CreateNews)
            .with_json(draft)
            .map_err(classify_decode)?;
        self.send(request).await.map(drop)
    }

    /// `GET /api/slots?date=&serviceId=`
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the call.
    pub async fn list_slots(&self, day: NaiveDate, service_id: i64) -> Result<Vec<TimeSlot>, ErrorKind> {
        self.fetch(
            ApiRequest::new(Endpoint::ListSlots)
                .with_query("date", format_query_date(day))
                .with_query("serviceId", service_id),
        )
        .await
    }

    /// `POST /api/appointments`
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the call.
    pub async fn create_booking(&self, service_id: i64, start: NaiveDateTime) -> Result<(), ErrorKind> {
        let request = ApiRequest::new(Endpoint::CreateBooking)
            .with_json(&json!({
                "serviceId": service_id,
                "startTime": format_server_datetime(&start),
            }))
            .map_err(classify_decode)?;
        self.send(request).await.map(drop)
    }
}
