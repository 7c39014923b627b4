//! Integration tests for Price-Ripple
//!
//! These tests use wiremock to stand in for marketplace APIs and crawled
//! sites and run whole lookups end to end.

mod common;
mod crawler_tests;
mod pricing_tests;
