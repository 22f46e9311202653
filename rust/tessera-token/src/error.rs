//! Error types for decoding, verifying and extending tokens

use tessera_credentials::KeyError;
use tessera_datalog::DatalogError;
use thiserror::Error;

/// Top level token failure
#[derive(Error, Debug)]
pub enum TokenError {
    /// The token text is not valid URL-safe base64
    #[error("invalid token encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// The token bytes do not form a token this crate can evaluate
    #[error("malformed token: {0}")]
    Format(#[from] FormatError),

    /// The signature chain or proof does not verify; nothing in the token
    /// may be trusted
    #[error("invalid token signature: {0}")]
    Signature(#[from] SignatureError),

    /// The token carries a final signature and cannot be extended
    #[error("token is sealed")]
    Sealed,

    /// Key material could not be loaded or generated
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// Structural problems with the envelope or a block
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Protobuf decoding failed
    #[error("protobuf decoding failed: {0}")]
    Protobuf(#[from] prost::DecodeError),

    /// The bytes decode, but are not the canonical encoding of the result
    #[error("non-canonical encoding")]
    NonCanonical,

    /// Block schema version outside the supported range
    #[error("unsupported block version {0}")]
    UnsupportedVersion(u32),

    /// The block uses a construct this evaluator does not implement
    #[error("unsupported {0}")]
    Unsupported(&'static str),

    /// A symbol index does not resolve
    #[error("unknown symbol {0}")]
    UnknownSymbol(u64),

    /// A block declares a symbol that is already in the table
    #[error("symbol {0:?} declared twice")]
    DuplicateSymbol(String),

    /// The symbol table outgrew the index space
    #[error("too many symbols")]
    TooManySymbols,

    /// A term has no content
    #[error("missing term")]
    MissingTerm,

    /// A fact contains a variable
    #[error("variable ${variable} in fact {name}")]
    VariableInFact {
        /// Predicate name of the fact
        name: String,
        /// The variable that was found
        variable: String,
    },

    /// A rule or check is not well formed
    #[error(transparent)]
    Invalid(#[from] DatalogError),
}

/// Failures of the signature chain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// A published key uses an algorithm other than ed25519
    #[error("unsupported key algorithm {algorithm} in block {block}")]
    UnsupportedAlgorithm {
        /// Index of the block publishing the key
        block: usize,
        /// The algorithm identifier found on the wire
        algorithm: i32,
    },

    /// A published key is not a valid ed25519 point
    #[error("invalid next key in block {block}")]
    InvalidKey {
        /// Index of the block publishing the key
        block: usize,
    },

    /// A block signature does not verify under the expected key
    #[error("invalid signature for block {block}")]
    InvalidSignature {
        /// Index of the block whose signature failed
        block: usize,
    },

    /// The token has no proof
    #[error("missing proof")]
    MissingProof,

    /// The proof does not close the chain
    #[error("invalid proof")]
    InvalidProof,
}
