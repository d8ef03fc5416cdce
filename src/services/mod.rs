pub mod ai;
pub mod api;
pub mod clock;
pub mod conversation;
pub mod dates;
pub mod events;
pub mod gate;
pub mod matching;
pub mod resolver;
pub mod workflow;
