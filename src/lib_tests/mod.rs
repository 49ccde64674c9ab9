// src/lib_tests/mod.rs
// Tests for the HoneyGuard context

mod guard;
