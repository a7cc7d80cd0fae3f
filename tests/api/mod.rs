//! HTTP surface tests.

mod connect_tests;
mod health_tests;
mod websocket_tests;
