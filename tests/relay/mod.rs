//! Relay scenario tests over the in-memory broker.

mod messaging_tests;
mod presence_tests;
