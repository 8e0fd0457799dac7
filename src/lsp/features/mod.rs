//! Navigation features built on the COBOL quick parser
//!
//! - `references.rs` - find references and definitions across a program and
//!   the copybooks it includes

pub mod references;

pub use references::{ReferenceResolver, word_at_position};
