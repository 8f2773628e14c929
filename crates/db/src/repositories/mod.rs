//! Repository layer for database operations.

mod challenge;
mod event;
mod organizer;
mod upload;

pub use challenge::ChallengeRepository;
pub use event::EventRepository;
pub use organizer::OrganizerRepository;
pub use upload::UploadRepository;
