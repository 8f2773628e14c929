//! Database entities.

pub mod challenge;
pub mod event;
pub mod organizer;
pub mod upload;

pub use challenge::Entity as Challenge;
pub use event::Entity as Event;
pub use organizer::Entity as Organizer;
pub use upload::Entity as Upload;
