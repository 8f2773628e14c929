//! Core business logic for photowall.

pub mod services;

pub use services::*;
