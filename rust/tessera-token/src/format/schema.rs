//! Protobuf messages of the biscuit v2 envelope and block encoding.
//!
//! Only the subset this crate understands is modelled with full types.
//! Constructs that must be rejected rather than ignored (scopes,
//! expressions, public key tables) are kept as opaque bytes so their
//! presence can be detected.

#![allow(missing_docs)]

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Biscuit {
    #[prost(uint32, optional, tag = "1")]
    pub root_key_id: Option<u32>,
    #[prost(message, required, tag = "2")]
    pub authority: SignedBlock,
    #[prost(message, repeated, tag = "3")]
    pub blocks: Vec<SignedBlock>,
    #[prost(message, required, tag = "4")]
    pub proof: Proof,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignedBlock {
    #[prost(bytes = "vec", required, tag = "1")]
    pub block: Vec<u8>,
    #[prost(message, required, tag = "2")]
    pub next_key: PublicKey,
    #[prost(bytes = "vec", required, tag = "3")]
    pub signature: Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub external_signature: Option<ExternalSignature>,
    #[prost(uint32, optional, tag = "5")]
    pub version: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExternalSignature {
    #[prost(bytes = "vec", required, tag = "1")]
    pub signature: Vec<u8>,
    #[prost(message, required, tag = "2")]
    pub public_key: PublicKey,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PublicKey {
    #[prost(enumeration = "public_key::Algorithm", required, tag = "1")]
    pub algorithm: i32,
    #[prost(bytes = "vec", required, tag = "2")]
    pub key: Vec<u8>,
}

pub mod public_key {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Algorithm {
        Ed25519 = 0,
        Secp256r1 = 1,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Proof {
    #[prost(oneof = "proof::Content", tags = "1, 2")]
    pub content: Option<proof::Content>,
}

pub mod proof {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Content {
        #[prost(bytes, tag = "1")]
        NextSecret(Vec<u8>),
        #[prost(bytes, tag = "2")]
        FinalSignature(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Block {
    #[prost(string, repeated, tag = "1")]
    pub symbols: Vec<String>,
    #[prost(string, optional, tag = "2")]
    pub context: Option<String>,
    #[prost(uint32, optional, tag = "3")]
    pub version: Option<u32>,
    #[prost(message, repeated, tag = "4")]
    pub facts_v2: Vec<FactV2>,
    #[prost(message, repeated, tag = "5")]
    pub rules_v2: Vec<RuleV2>,
    #[prost(message, repeated, tag = "6")]
    pub checks_v2: Vec<CheckV2>,
    #[prost(bytes = "vec", repeated, tag = "7")]
    pub scope: Vec<Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "8")]
    pub public_keys: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FactV2 {
    #[prost(message, required, tag = "1")]
    pub predicate: PredicateV2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RuleV2 {
    #[prost(message, required, tag = "1")]
    pub head: PredicateV2,
    #[prost(message, repeated, tag = "2")]
    pub body: Vec<PredicateV2>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub expressions: Vec<Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "4")]
    pub scope: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CheckV2 {
    #[prost(message, repeated, tag = "1")]
    pub queries: Vec<RuleV2>,
    #[prost(enumeration = "check_v2::Kind", optional, tag = "2")]
    pub kind: Option<i32>,
}

pub mod check_v2 {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Kind {
        One = 0,
        All = 1,
        Reject = 2,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PredicateV2 {
    #[prost(uint64, required, tag = "1")]
    pub name: u64,
    #[prost(message, repeated, tag = "2")]
    pub terms: Vec<TermV2>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TermV2 {
    #[prost(oneof = "term_v2::Content", tags = "1, 2, 3, 4, 5, 6")]
    pub content: Option<term_v2::Content>,
}

pub mod term_v2 {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Content {
        #[prost(uint32, tag = "1")]
        Variable(u32),
        #[prost(int64, tag = "2")]
        Integer(i64),
        #[prost(uint64, tag = "3")]
        String(u64),
        #[prost(uint64, tag = "4")]
        Date(u64),
        #[prost(bytes, tag = "5")]
        Bytes(Vec<u8>),
        #[prost(bool, tag = "6")]
        Bool(bool),
    }
}
