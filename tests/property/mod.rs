//! Property-based tests for resolution guarantees
