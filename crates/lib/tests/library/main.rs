//! End-to-end runs of the installer against a mock manifest server.

mod common;
mod run_tests;
