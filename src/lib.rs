//! # cherri
//!
//! Compiler front end for the Cherri scripting language: include expansion,
//! compilation to a Shortcuts plist, and package signing.

pub mod backend;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod preprocessor;
pub mod signer;
pub mod source;
pub mod writer;

pub use driver::{BuildOutcome, Driver};
pub use error::{CompileError, ParseError};
