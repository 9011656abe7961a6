#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod catalog;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod scheduling;
pub mod session;
pub mod slots;
pub mod speech;
pub mod submission;
pub mod transport;

pub use config::Config;
pub use dialogue::DialogueEngine;
pub use error::{Result, VoluntariaError};
