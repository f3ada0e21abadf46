//! Diagnostic creation, severity management, and terminal rendering.
//!
//! This crate provides structured [`Diagnostic`] messages with a severity,
//! a code, an optional source [`Location`], and the identity and phase of the
//! artifact build that produced them. Diagnostics are dispatched through the
//! [`Logger`] capability; the thread-safe [`DiagnosticSink`] is the standard
//! implementation and [`TerminalRenderer`] formats them for humans.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod location;
pub mod logger;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use location::Location;
pub use logger::{Logger, NullLogger};
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
