//! Utility helpers.

pub mod number;
