//! The booking write path: five steps, always in the same order, each one
//! committing its result to the session only once it has fully succeeded.

use std::fmt;
use std::future::Future;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::RetryPolicy;
use crate::errors::WorkflowError;
use crate::models::{
    Booking, BookingPet, BookingRequest, CachedPet, ConversationSession, Customer, MatchedService,
    NewCustomer, NewPet, Pet, PetMention, PetsUpdate,
};
use crate::services::api::{ProfessionalsApi, RemoteError};
use crate::services::dates::resolve_dates;
use crate::services::matching::{match_customer, match_pet, match_service};
use crate::services::resolver::{CustomerAction, PetAction, Plan, ServiceAction};

const DEFAULT_PET_GENDER: &str = "Male";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    EnsureCustomer,
    EnsurePets,
    EnsureService,
    ResolveDates,
    EnsureBooking,
}

impl WorkflowStep {
    pub const ORDER: [WorkflowStep; 5] = [
        WorkflowStep::EnsureCustomer,
        WorkflowStep::EnsurePets,
        WorkflowStep::EnsureService,
        WorkflowStep::ResolveDates,
        WorkflowStep::EnsureBooking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::EnsureCustomer => "ensure_customer",
            WorkflowStep::EnsurePets => "ensure_pets",
            WorkflowStep::EnsureService => "ensure_service",
            WorkflowStep::ResolveDates => "resolve_dates",
            WorkflowStep::EnsureBooking => "ensure_booking",
        }
    }

    /// Session state a step needs before it may start.
    pub fn preconditions(&self, session: &ConversationSession) -> Result<(), String> {
        let need_customer = || {
            session
                .customer_id
                .as_ref()
                .map(|_| ())
                .ok_or_else(|| "customer not resolved".to_string())
        };
        match self {
            WorkflowStep::EnsureCustomer
            | WorkflowStep::EnsureService
            | WorkflowStep::ResolveDates => Ok(()),
            WorkflowStep::EnsurePets => need_customer(),
            WorkflowStep::EnsureBooking => {
                need_customer()?;
                if session.pets.is_empty() {
                    return Err("no pets resolved".to_string());
                }
                if session.service.is_none() {
                    return Err("service not resolved".to_string());
                }
                if session.date_range.is_none() {
                    return Err("dates not resolved".to_string());
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub step: WorkflowStep,
    /// Answered from the session without remote I/O.
    pub reused: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowOutcome {
    pub booking_id: String,
    pub updated: bool,
    pub steps: Vec<StepReport>,
}

pub struct BookingWorkflow<'a> {
    api: &'a dyn ProfessionalsApi,
    professional_id: &'a str,
    retry: RetryPolicy,
}

/// Carried between steps within one run.
#[derive(Default)]
struct RunContext {
    customer_pets: Option<Vec<Pet>>,
}

impl<'a> BookingWorkflow<'a> {
    pub fn new(api: &'a dyn ProfessionalsApi, professional_id: &'a str, retry: RetryPolicy) -> Self {
        Self {
            api,
            professional_id,
            retry,
        }
    }

    /// Runs every step in `WorkflowStep::ORDER`, stopping at the first error.
    /// Steps that completed before the error stay committed to `session`.
    pub async fn run(
        &self,
        session: &mut ConversationSession,
        plan: &Plan,
        today: NaiveDate,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let mut ctx = RunContext::default();
        let mut steps = Vec::with_capacity(WorkflowStep::ORDER.len());
        let mut updated = false;

        for step in WorkflowStep::ORDER {
            step.preconditions(session)
                .map_err(|reason| WorkflowError::Validation { step, reason })?;

            let reused = match step {
                WorkflowStep::EnsureCustomer => self.ensure_customer(session, plan, &mut ctx).await?,
                WorkflowStep::EnsurePets => self.ensure_pets(session, plan, &mut ctx).await?,
                WorkflowStep::EnsureService => self.ensure_service(session, plan).await?,
                WorkflowStep::ResolveDates => {
                    let range = resolve_dates(
                        session.buffer.start_date_phrase.as_deref(),
                        session.buffer.end_date_phrase.as_deref(),
                        today,
                    )
                    .map_err(|e| WorkflowError::Validation {
                        step,
                        reason: e.to_string(),
                    })?;
                    session.date_range = Some(range);
                    false
                }
                WorkflowStep::EnsureBooking => {
                    updated = self.ensure_booking(session).await?;
                    false
                }
            };

            tracing::info!(
                thread_id = %session.thread_id,
                step = step.as_str(),
                reused,
                "workflow step completed"
            );
            steps.push(StepReport { step, reused });
        }

        let booking_id = session
            .booking_id
            .clone()
            .ok_or_else(|| WorkflowError::Validation {
                step: WorkflowStep::EnsureBooking,
                reason: "booking id missing after write".to_string(),
            })?;

        Ok(WorkflowOutcome {
            booking_id,
            updated,
            steps,
        })
    }

    async fn ensure_customer(
        &self,
        session: &mut ConversationSession,
        plan: &Plan,
        ctx: &mut RunContext,
    ) -> Result<bool, WorkflowError> {
        const STEP: WorkflowStep = WorkflowStep::EnsureCustomer;

        if let CustomerAction::Reuse { .. } = plan.customer {
            return Ok(true);
        }

        let buffer = &session.buffer;
        if !buffer.has_customer() {
            return Err(WorkflowError::Validation {
                step: STEP,
                reason: "no customer name, email or phone".to_string(),
            });
        }

        let customers = self
            .call(STEP, || self.api.get_customers(self.professional_id))
            .await?;

        let customer = match match_customer(
            &customers,
            buffer.customer_email.as_deref(),
            buffer.customer_phone.as_deref(),
            buffer.customer_name.as_deref(),
        ) {
            Some(found) => found.clone(),
            None => {
                let new_customer = NewCustomer::from_parts(
                    buffer.customer_name.as_deref(),
                    buffer.customer_email.as_deref(),
                    buffer.customer_phone.as_deref(),
                    self.professional_id,
                );
                self.call(STEP, || self.api.create_customer(&new_customer))
                    .await?
            }
        };

        let name = Some(customer.full_name())
            .filter(|n| !n.is_empty())
            .or_else(|| buffer.customer_name.clone());

        // A different customer owns none of the cached pets or booking.
        if session.customer_id.as_deref() != Some(customer.id.as_str()) {
            session.pets.clear();
            session.booking_id = None;
        }
        session.customer_id = Some(customer.id);
        session.customer_name = name;
        ctx.customer_pets = Some(customer.pets);
        Ok(false)
    }

    async fn ensure_pets(
        &self,
        session: &mut ConversationSession,
        plan: &Plan,
        ctx: &mut RunContext,
    ) -> Result<bool, WorkflowError> {
        const STEP: WorkflowStep = WorkflowStep::EnsurePets;

        if plan.pets.is_empty() {
            return Err(WorkflowError::Validation {
                step: STEP,
                reason: "no pets mentioned".to_string(),
            });
        }

        let customer_id = session.customer_id.clone().unwrap_or_default();
        let mut resolved: Vec<CachedPet> = Vec::new();
        let mut pending: Vec<NewPet> = Vec::new();

        // Cached pets from before a customer switch no longer count as cached.
        let needs_lookup = plan.pets.iter().any(|action| match action {
            PetAction::Reuse(cached) => !session.pets.iter().any(|p| p.id == cached.id),
            PetAction::Ensure(_) => true,
        });
        let existing = if needs_lookup {
            match ctx.customer_pets.take() {
                Some(pets) => pets,
                None => self.customer_pets(&customer_id).await?,
            }
        } else {
            Vec::new()
        };

        for action in &plan.pets {
            match action {
                PetAction::Reuse(cached) if session.pets.iter().any(|p| p.id == cached.id) => {
                    resolved.push(cached.clone());
                }
                PetAction::Reuse(cached) => {
                    let mention = PetMention {
                        name: cached.name.clone(),
                        species: cached.species.clone(),
                        breed: None,
                    };
                    match_or_queue(&existing, mention, &customer_id, &mut resolved, &mut pending)?;
                }
                PetAction::Ensure(mention) => {
                    match_or_queue(&existing, mention.clone(), &customer_id, &mut resolved, &mut pending)?;
                }
            }
        }

        if !pending.is_empty() {
            let update = PetsUpdate {
                id: customer_id.clone(),
                professional_id: self.professional_id.to_string(),
                pets: pending,
            };
            let customer: Customer = self.call(STEP, || self.api.create_pets(&update)).await?;
            for new_pet in &update.pets {
                let pet = match_pet(&customer.pets, &new_pet.name).ok_or_else(|| {
                    WorkflowError::PermanentRemote {
                        step: STEP,
                        message: format!("created pet {} missing from response", new_pet.name),
                    }
                })?;
                resolved.push(CachedPet {
                    id: pet.id.clone(),
                    name: new_pet.name.clone(),
                    species: pet.species.clone().or_else(|| Some(new_pet.species.clone())),
                });
            }
        }

        let mut pets: Vec<CachedPet> = Vec::with_capacity(resolved.len());
        for pet in resolved {
            if !pets.iter().any(|p| p.id == pet.id) {
                pets.push(pet);
            }
        }
        session.pets = pets;
        Ok(!needs_lookup)
    }

    async fn customer_pets(&self, customer_id: &str) -> Result<Vec<Pet>, WorkflowError> {
        let customers = self
            .call(WorkflowStep::EnsurePets, || {
                self.api.get_customers(self.professional_id)
            })
            .await?;
        Ok(customers
            .into_iter()
            .find(|c| c.id == customer_id)
            .map(|c| c.pets)
            .unwrap_or_default())
    }

    async fn ensure_service(
        &self,
        session: &mut ConversationSession,
        plan: &Plan,
    ) -> Result<bool, WorkflowError> {
        const STEP: WorkflowStep = WorkflowStep::EnsureService;

        let request = match &plan.service {
            ServiceAction::Reuse(_) => return Ok(true),
            ServiceAction::Match { request } => request,
        };

        let services = self
            .call(STEP, || self.api.get_services(self.professional_id))
            .await?;

        let matched = match_service(&services, request).ok_or_else(|| {
            WorkflowError::Validation {
                step: STEP,
                reason: format!("no active service matches \"{request}\""),
            }
        })?;
        let service = matched.service;
        let rate_id = service.rate_id().ok_or_else(|| WorkflowError::Validation {
            step: STEP,
            reason: format!("rate missing for {}", service.name),
        })?;

        tracing::debug!(service = %service.name, score = matched.score, "service matched");
        session.service = Some(MatchedService {
            service_id: service.id.clone(),
            service_name: service.name.clone(),
            rate_id: rate_id.to_string(),
            rate: service.rate_amount(),
            request: request.clone(),
        });
        Ok(false)
    }

    /// Returns true when an existing booking was updated.
    async fn ensure_booking(&self, session: &mut ConversationSession) -> Result<bool, WorkflowError> {
        const STEP: WorkflowStep = WorkflowStep::EnsureBooking;

        let (Some(customer_id), Some(service), Some(range)) = (
            session.customer_id.clone(),
            session.service.clone(),
            session.date_range,
        ) else {
            return Err(WorkflowError::Validation {
                step: STEP,
                reason: "booking details incomplete".to_string(),
            });
        };
        let pet_ids = session.pet_ids();

        let bookings = self
            .call(STEP, || self.api.get_bookings(self.professional_id))
            .await?;

        // Step 1 drops the cached booking when the customer really changed, so
        // a booking id still cached here belongs to this customer.
        let target = match &session.booking_id {
            Some(id) => Some(id.clone()),
            None => find_reusable_booking(&bookings, &customer_id, &pet_ids).map(|b| b.id.clone()),
        };

        if let Some(conflict) = bookings.iter().find(|b| {
            b.is_active()
                && Some(&b.id) != target.as_ref()
                && b.range().is_some_and(|r| r.overlaps(&range))
        }) {
            let window = conflict
                .range()
                .map(|r| r.to_human_readable())
                .unwrap_or_default();
            return Err(WorkflowError::Conflict {
                booking_id: conflict.id.clone(),
                window,
            });
        }

        let request = BookingRequest {
            client_id: customer_id,
            service_id: service.service_id,
            service_rate_id: service.rate_id,
            professional_id: self.professional_id.to_string(),
            start_date: range.start_date_str(),
            end_date: range.end_date_str(),
            start_time: range.start_time_str(),
            end_time: range.end_time_str(),
            booking_pets: pet_ids
                .iter()
                .map(|id| BookingPet {
                    pet_id: id.clone(),
                    special_instructions: None,
                })
                .collect(),
            notes: session.buffer.notes.clone().unwrap_or_default(),
            extra_pet_fee: 0.0,
            weekend_fee: 0.0,
        };

        let (booking, updated) = match target {
            Some(id) => {
                let b = self
                    .call(STEP, || self.api.update_booking(&id, &request))
                    .await?;
                (b, true)
            }
            None => {
                let b = self.call(STEP, || self.api.create_booking(&request)).await?;
                (b, false)
            }
        };

        session.booking_id = Some(booking.id);
        Ok(updated)
    }

    /// One remote call under the configured timeout, retrying transient
    /// failures with exponential backoff.
    async fn call<T, F, Fut>(&self, step: WorkflowStep, mut op: F) -> Result<T, WorkflowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.retry.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(RemoteError::Transient(format!(
                    "timed out after {:?}",
                    self.retry.timeout
                ))),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(RemoteError::Transient(message)) if attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        step = step.as_str(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "transient remote failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(RemoteError::Transient(message)) => {
                    return Err(WorkflowError::TransientRemote {
                        step,
                        attempts: attempt,
                        message,
                    });
                }
                Err(RemoteError::Permanent(message)) => {
                    return Err(WorkflowError::PermanentRemote { step, message });
                }
            }
        }
    }
}

/// Matches `mention` against the customer's existing pets, or queues it for
/// creation. Creation needs a species.
fn match_or_queue(
    existing: &[Pet],
    mention: PetMention,
    customer_id: &str,
    resolved: &mut Vec<CachedPet>,
    pending: &mut Vec<NewPet>,
) -> Result<(), WorkflowError> {
    if let Some(pet) = match_pet(existing, &mention.name) {
        resolved.push(CachedPet {
            id: pet.id.clone(),
            name: mention.name,
            species: pet.species.clone(),
        });
        return Ok(());
    }

    if pending.iter().any(|p| p.name.eq_ignore_ascii_case(&mention.name)) {
        return Ok(());
    }

    let species = mention.species.clone().ok_or_else(|| WorkflowError::Validation {
        step: WorkflowStep::EnsurePets,
        reason: format!("species missing for {}", mention.name),
    })?;
    pending.push(NewPet {
        owner_id: customer_id.to_string(),
        name: mention.name,
        species,
        breed: mention.breed.unwrap_or_default(),
        gender: DEFAULT_PET_GENDER.to_string(),
    });
    Ok(())
}

/// A scheduled booking for the same client covering exactly the same pets.
fn find_reusable_booking<'b>(
    bookings: &'b [Booking],
    customer_id: &str,
    pet_ids: &[String],
) -> Option<&'b Booking> {
    let mut wanted: Vec<&str> = pet_ids.iter().map(String::as_str).collect();
    wanted.sort_unstable();
    bookings.iter().find(|b| {
        if !b.is_active() || b.client_id.as_deref() != Some(customer_id) {
            return false;
        }
        let mut ids = b.pet_ids();
        ids.sort_unstable();
        ids == wanted
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::{BookingStatus, ExtractedEntities, Intent, Service, ServiceRate};
    use crate::services::api::memory::InMemoryProfessionalsApi;
    use crate::services::resolver::resolve;
    use chrono::Utc;

    const PRO: &str = "pro-1";

    fn today() -> NaiveDate {
        // Wednesday
        NaiveDate::from_ymd_opt(2025, 6, 11).unwrap()
    }

    fn retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            timeout: Duration::from_secs(2),
        }
    }

    fn api() -> InMemoryProfessionalsApi {
        InMemoryProfessionalsApi::new().with_services(vec![
            Service {
                id: "svc-walk".to_string(),
                name: "Dog Walking".to_string(),
                amount: Some(20.0),
                service_rate: Some(ServiceRate {
                    id: "rate-walk".to_string(),
                    amount: Some(20.0),
                }),
            },
            Service {
                id: "svc-sit".to_string(),
                name: "Pet Sitting".to_string(),
                amount: Some(50.0),
                service_rate: Some(ServiceRate {
                    id: "rate-sit".to_string(),
                    amount: Some(50.0),
                }),
            },
        ])
    }

    fn collected_session() -> ConversationSession {
        let mut s = ConversationSession::new("thread-1", Utc::now());
        let mut e = ExtractedEntities::with_intent(Intent::BookingDetails);
        e.customer_name = Some("Jane Doe".to_string());
        e.pets = vec![
            PetMention {
                name: "Max".to_string(),
                species: Some("Dog".to_string()),
                breed: None,
            },
            PetMention {
                name: "Bella".to_string(),
                species: Some("Dog".to_string()),
                breed: Some("Beagle".to_string()),
            },
        ];
        e.start_date_phrase = Some("this weekend".to_string());
        s.buffer.merge(&e);
        s
    }

    async fn run(
        api: &InMemoryProfessionalsApi,
        session: &mut ConversationSession,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let plan = resolve(session, &ExtractedEntities::with_intent(Intent::PetSitterConfirmation));
        BookingWorkflow::new(api, PRO, retry())
            .run(session, &plan, today())
            .await
    }

    #[test]
    fn test_step_order_is_fixed() {
        assert_eq!(WorkflowStep::ORDER[0], WorkflowStep::EnsureCustomer);
        assert_eq!(WorkflowStep::ORDER[4], WorkflowStep::EnsureBooking);
        assert_eq!(WorkflowStep::EnsurePets.to_string(), "ensure_pets");
    }

    #[tokio::test]
    async fn test_full_run_creates_everything() {
        let api = api();
        let mut session = collected_session();

        let outcome = run(&api, &mut session).await.unwrap();

        assert!(!outcome.updated);
        assert_eq!(outcome.steps.len(), 5);
        assert_eq!(
            api.calls(),
            vec![
                "get_customers",
                "create_customer",
                "create_pets",
                "get_services",
                "get_bookings",
                "create_booking"
            ]
        );
        assert_eq!(session.pets.len(), 2);
        assert_eq!(session.service.as_ref().unwrap().service_id, "svc-sit");

        let booking = &api.bookings()[0];
        assert_eq!(booking.start_date.as_deref(), Some("2025-06-14"));
        assert_eq!(booking.end_date.as_deref(), Some("2025-06-15"));
        assert_eq!(booking.end_time.as_deref(), Some("23:59"));
        assert_eq!(booking.booking_pets.len(), 2);
        assert_eq!(session.booking_id.as_deref(), Some(booking.id.as_str()));
    }

    #[tokio::test]
    async fn test_second_run_updates_same_booking() {
        let api = api();
        let mut session = collected_session();
        let first = run(&api, &mut session).await.unwrap();
        api.clear_calls();

        let second = run(&api, &mut session).await.unwrap();

        assert!(second.updated);
        assert_eq!(first.booking_id, second.booking_id);
        assert_eq!(api.call_count("get_customers"), 0);
        assert_eq!(api.call_count("create_booking"), 0);
        assert_eq!(api.call_count("update_booking"), 1);
        assert_eq!(api.bookings().len(), 1);
    }

    #[tokio::test]
    async fn test_renamed_customer_found_by_email_keeps_booking() {
        let api = api();
        let mut session = collected_session();
        session.buffer.customer_email = Some("jane@example.com".to_string());
        let first = run(&api, &mut session).await.unwrap();
        api.clear_calls();

        // Names that do not match each other, but the email finds the same record.
        session.buffer.customer_name = Some("Janie D".to_string());
        session.buffer.pets.retain(|p| p.name == "Bella");
        session.buffer.start_date_phrase = Some("next monday".to_string());

        let second = run(&api, &mut session).await.unwrap();

        assert!(second.updated);
        assert_eq!(second.booking_id, first.booking_id);
        assert_eq!(api.call_count("create_customer"), 0);
        assert_eq!(api.call_count("create_pets"), 0);
        assert_eq!(api.call_count("create_booking"), 0);
        assert_eq!(api.call_count("update_booking"), 1);

        let bookings = api.bookings();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].start_date.as_deref(), Some("2025-06-16"));
        assert_eq!(bookings[0].booking_pets.len(), 1);
    }

    #[tokio::test]
    async fn test_existing_customer_and_pets_are_matched() {
        let api = api();
        api.add_customer(Customer {
            id: "cust-9".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            email: None,
            phone: None,
            professional_id: Some(PRO.to_string()),
            pets: vec![
                Pet {
                    id: "pet-max".to_string(),
                    name: "Max".to_string(),
                    species: Some("Dog".to_string()),
                    breed: None,
                },
                Pet {
                    id: "pet-bella".to_string(),
                    name: "Bella Rose".to_string(),
                    species: Some("Dog".to_string()),
                    breed: None,
                },
            ],
        });
        let mut session = collected_session();

        run(&api, &mut session).await.unwrap();

        assert_eq!(session.customer_id.as_deref(), Some("cust-9"));
        assert_eq!(session.pet_ids(), vec!["pet-max", "pet-bella"]);
        assert_eq!(api.call_count("create_customer"), 0);
        assert_eq!(api.call_count("create_pets"), 0);
    }

    #[tokio::test]
    async fn test_overlap_is_a_conflict_and_keeps_booking_unset() {
        let api = api();
        api.add_booking(Booking {
            id: "other".to_string(),
            client_id: Some("someone-else".to_string()),
            service_id: Some("svc-sit".to_string()),
            service_rate_id: None,
            professional_id: Some(PRO.to_string()),
            start_date: Some("2025-06-15".to_string()),
            end_date: Some("2025-06-15".to_string()),
            start_time: Some("10:00".to_string()),
            end_time: Some("12:00".to_string()),
            notes: None,
            status: BookingStatus::Scheduled,
            booking_pets: vec![],
        });
        let mut session = collected_session();

        let err = run(&api, &mut session).await.unwrap_err();

        assert!(matches!(err, WorkflowError::Conflict { ref booking_id, .. } if booking_id == "other"));
        assert!(session.booking_id.is_none());
        // Earlier steps stay committed.
        assert!(session.customer_id.is_some());
        assert_eq!(api.call_count("create_booking"), 0);
    }

    #[tokio::test]
    async fn test_cancelled_booking_does_not_conflict() {
        let api = api();
        api.add_booking(Booking {
            id: "old".to_string(),
            client_id: None,
            service_id: None,
            service_rate_id: None,
            professional_id: Some(PRO.to_string()),
            start_date: Some("2025-06-14".to_string()),
            end_date: None,
            start_time: None,
            end_time: None,
            notes: None,
            status: BookingStatus::Cancelled,
            booking_pets: vec![],
        });
        let mut session = collected_session();
        assert!(run(&api, &mut session).await.is_ok());
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let api = api();
        api.fail_next("get_services", RemoteError::Transient("HTTP 503".to_string()));
        let mut session = collected_session();

        run(&api, &mut session).await.unwrap();
        assert_eq!(api.call_count("get_services"), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let api = api();
        for _ in 0..3 {
            api.fail_next("get_customers", RemoteError::Transient("HTTP 504".to_string()));
        }
        let mut session = collected_session();

        let err = run(&api, &mut session).await.unwrap_err();
        assert_eq!(
            err,
            WorkflowError::TransientRemote {
                step: WorkflowStep::EnsureCustomer,
                attempts: 3,
                message: "HTTP 504".to_string(),
            }
        );
        assert_eq!(api.write_count(), 0);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let api = api();
        api.fail_next("create_booking", RemoteError::from_status(422, "bad"));
        let mut session = collected_session();

        let err = run(&api, &mut session).await.unwrap_err();
        assert_eq!(err.kind(), "permanent_remote");
        assert_eq!(api.call_count("create_booking"), 1);
        assert!(session.booking_id.is_none());
    }

    #[tokio::test]
    async fn test_missing_species_fails_before_booking() {
        let api = api();
        let mut session = collected_session();
        session.buffer.pets.push(PetMention::named("Rex"));

        let err = run(&api, &mut session).await.unwrap_err();
        assert_eq!(err.step(), Some(WorkflowStep::EnsurePets));
        assert_eq!(api.call_count("get_bookings"), 0);
    }

    #[tokio::test]
    async fn test_unmatched_service_is_validation_failure() {
        let api = api();
        let mut session = collected_session();
        session.buffer.service_name = Some("horse riding".to_string());

        let err = run(&api, &mut session).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation { step: WorkflowStep::EnsureService, .. }));
        assert!(session.service.is_none());
    }

    #[tokio::test]
    async fn test_ambiguous_dates_fail_resolution() {
        let api = api();
        let mut session = collected_session();
        session.buffer.start_date_phrase = Some("sometime soon".to_string());

        let err = run(&api, &mut session).await.unwrap_err();
        assert_eq!(err.step(), Some(WorkflowStep::ResolveDates));
        assert_eq!(api.call_count("get_bookings"), 0);
    }

    #[tokio::test]
    async fn test_scheduled_booking_for_same_pets_is_adopted() {
        let api = api();
        let mut session = collected_session();
        run(&api, &mut session).await.unwrap();
        let booking_id = session.booking_id.take().unwrap();
        api.clear_calls();

        // Lost the cached booking id but the remote booking still matches.
        let outcome = run(&api, &mut session).await.unwrap();
        assert!(outcome.updated);
        assert_eq!(outcome.booking_id, booking_id);
    }
}
