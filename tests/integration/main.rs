//! Integration test suite

mod config_test;
mod e2e_test;
