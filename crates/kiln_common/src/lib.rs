//! Shared foundational types used across the kiln build core.
//!
//! This crate provides qualified definition names, content hashing and
//! streaming checksums, interned identifiers, and the internal error type.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod qname;
pub mod result;

pub use hash::{Checksum, ContentHash};
pub use ident::{Ident, Interner};
pub use qname::{ParseQNameError, QName};
pub use result::InternalError;
