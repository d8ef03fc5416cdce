//! Decides, before any remote I/O, which workflow steps can reuse IDs already
//! cached in the session and which need to talk to the API.

use crate::models::{CachedPet, ConversationSession, ExtractedEntities, MatchedService, PetMention};
use crate::services::matching::{names_compatible, normalize_phrase};

/// Requested when the chat never named a service.
pub const DEFAULT_SERVICE_REQUEST: &str = "pet sitting";

#[derive(Debug, Clone, PartialEq)]
pub enum CustomerAction {
    Reuse { customer_id: String },
    Fetch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PetAction {
    Reuse(CachedPet),
    Ensure(PetMention),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceAction {
    Reuse(MatchedService),
    Match { request: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingAction {
    Update { booking_id: String },
    Create,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub customer: CustomerAction,
    pub pets: Vec<PetAction>,
    pub service: ServiceAction,
    pub booking: BookingAction,
    /// A different customer was named than the one cached; cached customer,
    /// pet and booking IDs must not be used.
    pub customer_changed: bool,
}

impl Plan {
    pub fn reuses_customer(&self) -> bool {
        matches!(self.customer, CustomerAction::Reuse { .. })
    }

    pub fn reuses_all_pets(&self) -> bool {
        self.pets.iter().all(|p| matches!(p, PetAction::Reuse(_)))
    }

    pub fn reuses_service(&self) -> bool {
        matches!(self.service, ServiceAction::Reuse(_))
    }

    pub fn pets_to_ensure(&self) -> Vec<&PetMention> {
        self.pets
            .iter()
            .filter_map(|p| match p {
                PetAction::Ensure(m) => Some(m),
                PetAction::Reuse(_) => None,
            })
            .collect()
    }

    /// Number of ensure steps that need the remote API. The booking step
    /// always does.
    pub fn remote_steps(&self) -> usize {
        let mut n = 1;
        if !self.reuses_customer() {
            n += 1;
        }
        if !self.reuses_all_pets() {
            n += 1;
        }
        if !self.reuses_service() {
            n += 1;
        }
        n
    }
}

/// Builds the plan from the session (with this message already merged into
/// its buffer) and the entities extracted from the current message.
pub fn resolve(session: &ConversationSession, entities: &ExtractedEntities) -> Plan {
    let named = entities
        .customer_name
        .as_deref()
        .or(session.buffer.customer_name.as_deref());

    let customer_changed = match (named, session.customer_name.as_deref()) {
        (Some(named), Some(confirmed)) if session.customer_id.is_some() => {
            !names_compatible(named, confirmed)
        }
        _ => false,
    };

    let customer = match &session.customer_id {
        Some(id) if !customer_changed => CustomerAction::Reuse {
            customer_id: id.clone(),
        },
        _ => CustomerAction::Fetch,
    };

    let pets = plan_pets(session, customer_changed);
    let service = plan_service(session);

    let booking = match &session.booking_id {
        Some(id) if !customer_changed => BookingAction::Update {
            booking_id: id.clone(),
        },
        _ => BookingAction::Create,
    };

    Plan {
        customer,
        pets,
        service,
        booking,
        customer_changed,
    }
}

/// True when the message names someone other than the customer the session
/// is collecting for. The details buffered so far then describe another
/// customer's booking.
pub fn names_other_customer(session: &ConversationSession, entities: &ExtractedEntities) -> bool {
    let Some(named) = entities.customer_name.as_deref() else {
        return false;
    };
    session
        .buffer
        .customer_name
        .as_deref()
        .or(session.customer_name.as_deref())
        .is_some_and(|current| !names_compatible(named, current))
}

fn plan_pets(session: &ConversationSession, customer_changed: bool) -> Vec<PetAction> {
    if customer_changed {
        return session
            .buffer
            .pets
            .iter()
            .cloned()
            .map(PetAction::Ensure)
            .collect();
    }

    let mut actions: Vec<PetAction> = session.pets.iter().cloned().map(PetAction::Reuse).collect();
    for mention in &session.buffer.pets {
        if session.cached_pet(&mention.name).is_none() {
            actions.push(PetAction::Ensure(mention.clone()));
        }
    }
    actions
}

fn plan_service(session: &ConversationSession) -> ServiceAction {
    let requested = session.buffer.service_name.as_deref();

    if let Some(matched) = &session.service {
        let unchanged = requested
            .map_or(true, |r| normalize_phrase(r) == normalize_phrase(&matched.request));
        if unchanged {
            return ServiceAction::Reuse(matched.clone());
        }
    }

    ServiceAction::Match {
        request: requested.unwrap_or(DEFAULT_SERVICE_REQUEST).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Intent;
    use chrono::Utc;

    fn confirmation() -> ExtractedEntities {
        ExtractedEntities::with_intent(Intent::PetSitterConfirmation)
    }

    fn known_session() -> ConversationSession {
        let mut s = ConversationSession::new("t-1", Utc::now());
        s.customer_id = Some("c-1".to_string());
        s.customer_name = Some("Jane Doe".to_string());
        s.pets = vec![CachedPet {
            id: "p-1".to_string(),
            name: "Max".to_string(),
            species: Some("Dog".to_string()),
        }];
        s.buffer.pets = vec![PetMention::named("max")];
        s.service = Some(MatchedService {
            service_id: "s-1".to_string(),
            service_name: "Pet Sitting".to_string(),
            rate_id: "r-1".to_string(),
            rate: Some(40.0),
            request: "pet sitting".to_string(),
        });
        s.booking_id = Some("b-1".to_string());
        s
    }

    #[test]
    fn test_fresh_session_fetches_everything() {
        let mut s = ConversationSession::new("t-1", Utc::now());
        s.buffer.customer_name = Some("Jane".to_string());
        s.buffer.pets = vec![PetMention::named("Max"), PetMention::named("Bella")];

        let plan = resolve(&s, &confirmation());
        assert_eq!(plan.customer, CustomerAction::Fetch);
        assert_eq!(plan.pets_to_ensure().len(), 2);
        assert_eq!(
            plan.service,
            ServiceAction::Match {
                request: DEFAULT_SERVICE_REQUEST.to_string()
            }
        );
        assert_eq!(plan.booking, BookingAction::Create);
        assert_eq!(plan.remote_steps(), 4);
    }

    #[test]
    fn test_known_session_reuses_cached_ids() {
        let plan = resolve(&known_session(), &confirmation());
        assert!(plan.reuses_customer());
        assert!(plan.reuses_all_pets());
        assert!(plan.reuses_service());
        assert_eq!(
            plan.booking,
            BookingAction::Update {
                booking_id: "b-1".to_string()
            }
        );
        assert_eq!(plan.remote_steps(), 1);
    }

    #[test]
    fn test_first_name_is_not_a_conflict() {
        let mut e = confirmation();
        e.customer_name = Some("jane".to_string());
        let plan = resolve(&known_session(), &e);
        assert!(!plan.customer_changed);
        assert!(plan.reuses_customer());
    }

    #[test]
    fn test_different_customer_invalidates_cache() {
        let mut e = confirmation();
        e.customer_name = Some("John Smith".to_string());
        let plan = resolve(&known_session(), &e);
        assert!(plan.customer_changed);
        assert_eq!(plan.customer, CustomerAction::Fetch);
        assert_eq!(plan.booking, BookingAction::Create);
        assert!(matches!(plan.pets[0], PetAction::Ensure(_)));
    }

    #[test]
    fn test_names_other_customer() {
        let session = known_session();
        let mut e = ExtractedEntities::with_intent(Intent::BookingDetails);
        assert!(!names_other_customer(&session, &e));

        e.customer_name = Some("jane".to_string());
        assert!(!names_other_customer(&session, &e));

        e.customer_name = Some("John Smith".to_string());
        assert!(names_other_customer(&session, &e));

        // Nobody to conflict with yet.
        let fresh = ConversationSession::new("t-2", Utc::now());
        assert!(!names_other_customer(&fresh, &e));
    }

    #[test]
    fn test_new_pet_is_ensured_alongside_cached() {
        let mut s = known_session();
        s.buffer.pets.push(PetMention::named("Bella"));
        let plan = resolve(&s, &confirmation());
        assert_eq!(plan.pets.len(), 2);
        assert!(matches!(&plan.pets[0], PetAction::Reuse(p) if p.id == "p-1"));
        assert_eq!(plan.pets_to_ensure()[0].name, "Bella");
    }

    #[test]
    fn test_changed_service_request_rematches() {
        let mut s = known_session();
        s.buffer.service_name = Some("Dog walking".to_string());
        let plan = resolve(&s, &confirmation());
        assert_eq!(
            plan.service,
            ServiceAction::Match {
                request: "Dog walking".to_string()
            }
        );

        s.buffer.service_name = Some("Pet  Sitting".to_string());
        assert!(resolve(&s, &confirmation()).reuses_service());
    }
}
