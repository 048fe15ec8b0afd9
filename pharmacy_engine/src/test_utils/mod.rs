//! Helpers for tests that need a real database or stand-ins for the external services.
pub mod fakes;
pub mod prepare_env;
pub mod seed;
