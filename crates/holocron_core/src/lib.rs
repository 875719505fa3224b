//! Core utilities for holocron.
//!
//! This crate provides foundational types used throughout holocron:
//! - `span`: Source location tracking and line/column mapping
//! - `diagnostics`: Error reporting

pub mod diagnostics;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticBag, Label};
pub use span::{LineIndex, Position, Span};
