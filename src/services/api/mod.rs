pub mod http;
pub mod memory;

use async_trait::async_trait;

use crate::models::{Booking, BookingRequest, Customer, NewCustomer, PetsUpdate, Service};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Network failures, timeouts, 429 and 5xx. Safe to retry.
    #[error("transient remote failure: {0}")]
    Transient(String),

    /// Auth failures, other 4xx and malformed bodies. Never retried.
    #[error("permanent remote failure: {0}")]
    Permanent(String),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}: {body}");
        if status == 429 || status == 408 || status >= 500 {
            RemoteError::Transient(message)
        } else {
            RemoteError::Permanent(message)
        }
    }
}

/// The pet professionals REST API. Implementations must not cache; the
/// session is the only cache.
#[async_trait]
pub trait ProfessionalsApi: Send + Sync {
    async fn get_customers(&self, professional_id: &str) -> Result<Vec<Customer>, RemoteError>;

    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer, RemoteError>;

    /// Attaches new pets to an existing customer; returns the customer with all pets.
    async fn create_pets(&self, update: &PetsUpdate) -> Result<Customer, RemoteError>;

    async fn get_services(&self, professional_id: &str) -> Result<Vec<Service>, RemoteError>;

    async fn get_bookings(&self, professional_id: &str) -> Result<Vec<Booking>, RemoteError>;

    async fn create_booking(&self, booking: &BookingRequest) -> Result<Booking, RemoteError>;

    async fn update_booking(
        &self,
        booking_id: &str,
        booking: &BookingRequest,
    ) -> Result<Booking, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(RemoteError::from_status(503, "").is_transient());
        assert!(RemoteError::from_status(429, "slow down").is_transient());
        assert!(!RemoteError::from_status(401, "").is_transient());
        assert!(!RemoteError::from_status(422, "bad date").is_transient());
    }
}
