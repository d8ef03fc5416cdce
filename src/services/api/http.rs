use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::{ProfessionalsApi, RemoteError};
use crate::models::{Booking, BookingRequest, Customer, NewCustomer, PetsUpdate, Service};

pub struct HttpProfessionalsApi {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpProfessionalsApi {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.api_key)
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, RemoteError> {
        let resp = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| RemoteError::Transient(format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RemoteError::Transient(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "pet professionals API returned error");
            return Err(RemoteError::from_status(status.as_u16(), &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| RemoteError::Permanent(format!("unexpected response body: {e}")))
    }
}

#[async_trait]
impl ProfessionalsApi for HttpProfessionalsApi {
    async fn get_customers(&self, professional_id: &str) -> Result<Vec<Customer>, RemoteError> {
        let url = self.url(&format!("customers/professional/{professional_id}"));
        self.send(self.client.get(url)).await
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer, RemoteError> {
        self.send(self.client.post(self.url("customers")).json(customer))
            .await
    }

    async fn create_pets(&self, update: &PetsUpdate) -> Result<Customer, RemoteError> {
        let url = self.url(&format!("customers/{}", update.id));
        self.send(self.client.put(url).json(update)).await
    }

    async fn get_services(&self, professional_id: &str) -> Result<Vec<Service>, RemoteError> {
        let url = self.url(&format!("services/professional/{professional_id}/active"));
        self.send(self.client.get(url)).await
    }

    async fn get_bookings(&self, professional_id: &str) -> Result<Vec<Booking>, RemoteError> {
        let url = self.url(&format!("bookings/professional/{professional_id}"));
        self.send(self.client.get(url)).await
    }

    async fn create_booking(&self, booking: &BookingRequest) -> Result<Booking, RemoteError> {
        self.send(self.client.post(self.url("bookings")).json(booking))
            .await
    }

    async fn update_booking(
        &self,
        booking_id: &str,
        booking: &BookingRequest,
    ) -> Result<Booking, RemoteError> {
        let url = self.url(&format!("bookings/{booking_id}"));
        self.send(self.client.put(url).json(booking)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building_strips_trailing_slash() {
        let api = HttpProfessionalsApi::new("https://api.example.com/".to_string(), String::new());
        assert_eq!(
            api.url("bookings/professional/pro-1"),
            "https://api.example.com/api/v1/bookings/professional/pro-1"
        );
    }
}
