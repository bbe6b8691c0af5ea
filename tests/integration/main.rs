//! Integration tests against a mock GitHub release registry.

mod check_tests;
mod download_tests;
mod fixture;
mod scheduler_tests;
