//! Shared utilities and common types for the event mailer backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Cryptographic utilities (hashing, random token material)
//! - Common validation logic for contact data

pub mod crypto;
pub mod validation;
