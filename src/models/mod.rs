pub mod booking;
pub mod customer;
pub mod event;
pub mod intent;
pub mod service;
pub mod session;

pub use booking::{Booking, BookingPet, BookingRequest, BookingStatus, DateRange};
pub use customer::{Customer, NewCustomer, NewPet, Pet, PetsUpdate};
pub use event::ActivityEvent;
pub use intent::{ExtractedEntities, Intent, PetMention};
pub use service::{MatchedService, Service, ServiceRate};
pub use session::{BookingBuffer, CachedPet, ConversationMessage, ConversationSession, GateState};
