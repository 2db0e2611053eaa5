//! Helpers shared by unit tests that need a local mock server.

pub mod socket_guard;
