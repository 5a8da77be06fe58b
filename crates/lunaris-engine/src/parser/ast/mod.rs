//! Abstract syntax tree for Lua chunks.
//!
//! Every name in the tree is already resolved to a [`SymbolRef`] and every
//! block carries the slot range it owns, so code generation never consults
//! the scope stack again.
//!
//! [`SymbolRef`]: crate::parser::scope::SymbolRef

pub mod expression;
pub mod statement;

pub use expression::*;
pub use statement::*;
