//! Production implementations of the engine's external collaborators.
pub mod notifier;
pub mod stripe;
