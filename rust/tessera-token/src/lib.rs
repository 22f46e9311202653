//! Tessera capability tokens.
//!
//! Tokens use the biscuit v2 wire format: a protobuf envelope of ed25519
//! signed blocks, each carrying facts, rules and checks for
//! [`tessera_datalog`]. Anyone holding an unsealed token can derive a
//! narrower one with [`Token::append`]; nobody can widen it.
//!
//! ```
//! use tessera_credentials::KeyPair;
//! use tessera_datalog::Fact;
//! use tessera_token::{BlockBuilder, Token, TokenBuilder};
//!
//! let root = KeyPair::generate().unwrap();
//! let token = TokenBuilder::new(
//!     BlockBuilder::new().with_fact(Fact::new("k8s:userinfo:username", ["alice"])),
//! )
//! .build(&root)
//! .unwrap();
//!
//! let decoded = Token::from_base64(&token.to_base64()).unwrap();
//! let context = decoded.verify(&root.public()).unwrap();
//! assert_eq!(context.fact_count(), 1);
//! ```

#![warn(missing_docs)]

mod block;
mod error;
pub mod format;
mod symbol;
mod token;

pub use block::{BLOCK_VERSION, Block, BlockBuilder, MAX_BLOCK_VERSION, MIN_BLOCK_VERSION};
pub use error::{FormatError, SignatureError, TokenError};
pub use symbol::{DEFAULT_SYMBOLS, OFFSET, SymbolTable};
pub use token::{Token, TokenBuilder, verify};
