//! Dispatcher tests
