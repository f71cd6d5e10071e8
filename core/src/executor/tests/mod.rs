//! Tests for the script executor
//!
//! Organized by feature area

mod basic_tests;
mod error_tests;
mod helpers;
mod limits_tests;
