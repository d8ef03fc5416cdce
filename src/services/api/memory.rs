use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ProfessionalsApi, RemoteError};
use crate::models::{
    Booking, BookingRequest, BookingStatus, Customer, NewCustomer, Pet, PetsUpdate, Service,
};

/// In-process stand-in for the professionals API. Records every call by
/// operation name and can be told to fail the next call of an operation.
#[derive(Default)]
pub struct InMemoryProfessionalsApi {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    customers: Vec<Customer>,
    services: Vec<Service>,
    bookings: Vec<Booking>,
    calls: Vec<&'static str>,
    failures: VecDeque<(&'static str, RemoteError)>,
    next_id: u64,
}

impl Inner {
    fn record(&mut self, op: &'static str) -> Result<(), RemoteError> {
        self.calls.push(op);
        match self.failures.iter().position(|(o, _)| *o == op) {
            Some(idx) => match self.failures.remove(idx) {
                Some((_, err)) => Err(err),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

pub const WRITE_OPERATIONS: &[&str] = &[
    "create_customer",
    "create_pets",
    "create_booking",
    "update_booking",
];

impl InMemoryProfessionalsApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_services(self, services: Vec<Service>) -> Self {
        self.lock().services = services;
        self
    }

    pub fn add_customer(&self, customer: Customer) {
        self.lock().customers.push(customer);
    }

    pub fn add_booking(&self, booking: Booking) {
        self.lock().bookings.push(booking);
    }

    /// The next call to `op` returns `err` instead of running.
    pub fn fail_next(&self, op: &'static str, err: RemoteError) {
        self.lock().failures.push_back((op, err));
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|c| **c == op).count()
    }

    pub fn write_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| WRITE_OPERATIONS.contains(c))
            .count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.lock().customers.clone()
    }

    pub fn bookings(&self) -> Vec<Booking> {
        self.lock().bookings.clone()
    }
}

fn booking_from_request(id: String, req: &BookingRequest) -> Booking {
    Booking {
        id,
        client_id: Some(req.client_id.clone()),
        service_id: Some(req.service_id.clone()),
        service_rate_id: Some(req.service_rate_id.clone()),
        professional_id: Some(req.professional_id.clone()),
        start_date: Some(req.start_date.clone()),
        end_date: Some(req.end_date.clone()),
        start_time: Some(req.start_time.clone()),
        end_time: Some(req.end_time.clone()),
        notes: Some(req.notes.clone()).filter(|n| !n.is_empty()),
        status: BookingStatus::Scheduled,
        booking_pets: req.booking_pets.clone(),
    }
}

fn not_found(what: &str, id: &str) -> RemoteError {
    RemoteError::from_status(404, &format!("{what} {id} not found"))
}

#[async_trait]
impl ProfessionalsApi for InMemoryProfessionalsApi {
    async fn get_customers(&self, professional_id: &str) -> Result<Vec<Customer>, RemoteError> {
        let mut inner = self.lock();
        inner.record("get_customers")?;
        Ok(inner
            .customers
            .iter()
            .filter(|c| c.professional_id.as_deref().map_or(true, |p| p == professional_id))
            .cloned()
            .collect())
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<Customer, RemoteError> {
        let mut inner = self.lock();
        inner.record("create_customer")?;
        let created = Customer {
            id: inner.next_id("customer"),
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
            email: Some(customer.email.clone()).filter(|e| !e.is_empty()),
            phone: Some(customer.phone.clone()).filter(|p| !p.is_empty()),
            professional_id: Some(customer.professional_id.clone()),
            pets: Vec::new(),
        };
        inner.customers.push(created.clone());
        Ok(created)
    }

    async fn create_pets(&self, update: &PetsUpdate) -> Result<Customer, RemoteError> {
        let mut inner = self.lock();
        inner.record("create_pets")?;
        let ids: Vec<String> = update.pets.iter().map(|_| inner.next_id("pet")).collect();
        let customer = inner
            .customers
            .iter_mut()
            .find(|c| c.id == update.id)
            .ok_or_else(|| not_found("customer", &update.id))?;
        for (id, pet) in ids.into_iter().zip(&update.pets) {
            customer.pets.push(Pet {
                id,
                name: pet.name.clone(),
                species: Some(pet.species.clone()),
                breed: Some(pet.breed.clone()).filter(|b| !b.is_empty()),
            });
        }
        Ok(customer.clone())
    }

    async fn get_services(&self, _professional_id: &str) -> Result<Vec<Service>, RemoteError> {
        let mut inner = self.lock();
        inner.record("get_services")?;
        Ok(inner.services.clone())
    }

    async fn get_bookings(&self, professional_id: &str) -> Result<Vec<Booking>, RemoteError> {
        let mut inner = self.lock();
        inner.record("get_bookings")?;
        Ok(inner
            .bookings
            .iter()
            .filter(|b| b.professional_id.as_deref().map_or(true, |p| p == professional_id))
            .cloned()
            .collect())
    }

    async fn create_booking(&self, booking: &BookingRequest) -> Result<Booking, RemoteError> {
        let mut inner = self.lock();
        inner.record("create_booking")?;
        let id = inner.next_id("booking");
        let created = booking_from_request(id, booking);
        inner.bookings.push(created.clone());
        Ok(created)
    }

    async fn update_booking(
        &self,
        booking_id: &str,
        booking: &BookingRequest,
    ) -> Result<Booking, RemoteError> {
        let mut inner = self.lock();
        inner.record("update_booking")?;
        let existing = inner
            .bookings
            .iter_mut()
            .find(|b| b.id == booking_id)
            .ok_or_else(|| not_found("booking", booking_id))?;
        *existing = booking_from_request(booking_id.to_string(), booking);
        Ok(existing.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_failure_hits_only_named_operation() {
        let api = InMemoryProfessionalsApi::new();
        api.fail_next("get_services", RemoteError::Transient("HTTP 503".to_string()));

        assert!(api.get_customers("pro-1").await.is_ok());
        assert!(api.get_services("pro-1").await.is_err());
        assert!(api.get_services("pro-1").await.is_ok());
        assert_eq!(
            api.calls(),
            vec!["get_customers", "get_services", "get_services"]
        );
        assert_eq!(api.write_count(), 0);
    }

    #[tokio::test]
    async fn test_create_pets_requires_known_customer() {
        let api = InMemoryProfessionalsApi::new();
        let err = api
            .create_pets(&PetsUpdate {
                id: "nope".to_string(),
                professional_id: "pro-1".to_string(),
                pets: vec![],
            })
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }
}
