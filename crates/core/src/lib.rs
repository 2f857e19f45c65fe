//! Domain layer of the learning engine: event model, flashcards, practice
//! sessions, spaced repetition, adaptive difficulty, analytics and
//! gamification. Nothing here performs I/O.

#![forbid(unsafe_code)]

pub mod analytics;
pub mod error;
pub mod gamification;
pub mod model;
pub mod practice;
pub mod scheduler;
pub mod time;

pub use error::Error;
pub use time::Clock;
