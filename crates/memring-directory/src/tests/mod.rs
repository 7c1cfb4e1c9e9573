//! Tests for the memring-directory crate.

mod helpers;
