//! Signed tokens: issuance, verification, attenuation and sealing.
//!
//! A token is an append-only chain of signed blocks. The authority block is
//! signed by the root key; every block publishes the key that must sign its
//! successor. The chain is closed by a proof: either the secret half of the
//! last published key (the token can still be extended) or a signature by
//! that key over the last block (the token is sealed).
//!
//! Signatures are checked over the raw block bytes before any block content
//! is decoded, so nothing from an unverified token reaches the evaluator.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use prost::Message;
use tessera_credentials::{KeyPair, PublicKey, RootKeyProvider};
use tessera_datalog::{AuthorizerContext, Scope};

use crate::block::{Block, BlockBuilder};
use crate::error::{FormatError, SignatureError, TokenError};
use crate::format::convert;
use crate::format::schema::{self, proof::Content as ProofContent};
use crate::symbol::SymbolTable;

const ED25519: i32 = schema::public_key::Algorithm::Ed25519 as i32;

/// Bytes covered by a block signature: the block, then the algorithm and
/// bytes of the key it publishes.
fn block_payload(data: &[u8], next_key: &schema::PublicKey) -> Vec<u8> {
    let mut payload = Vec::with_capacity(data.len() + 4 + next_key.key.len());
    payload.extend_from_slice(data);
    payload.extend_from_slice(&next_key.algorithm.to_le_bytes());
    payload.extend_from_slice(&next_key.key);
    payload
}

/// Bytes covered by the final signature of a sealed token.
fn seal_payload(last: &schema::SignedBlock) -> Vec<u8> {
    let mut payload = block_payload(&last.block, &last.next_key);
    payload.extend_from_slice(&last.signature);
    payload
}

fn published_key(block: usize, key: &schema::PublicKey) -> Result<PublicKey, SignatureError> {
    if key.algorithm != ED25519 {
        return Err(SignatureError::UnsupportedAlgorithm {
            block,
            algorithm: key.algorithm,
        });
    }
    PublicKey::from_bytes(&key.key).map_err(|_| SignatureError::InvalidKey { block })
}

fn sign_block(signer: &KeyPair, block: Vec<u8>, next: &PublicKey) -> schema::SignedBlock {
    let next_key = schema::PublicKey {
        algorithm: ED25519,
        key: next.to_bytes().to_vec(),
    };
    let signature = signer.sign(&block_payload(&block, &next_key)).to_vec();
    schema::SignedBlock {
        block,
        next_key,
        signature,
        external_signature: None,
        version: None,
    }
}

/// A capability token.
///
/// `Token` values are immutable: [`Token::append`] and [`Token::seal`]
/// return new tokens and copy the existing blocks byte for byte.
#[derive(Clone, PartialEq)]
pub struct Token {
    envelope: schema::Biscuit,
}

impl Token {
    /// Decode a token without checking any signature.
    ///
    /// Only the canonical encoding of a token is accepted, so two distinct
    /// byte strings never decode to the same token.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TokenError> {
        let envelope = schema::Biscuit::decode(bytes).map_err(FormatError::from)?;
        if envelope.encoded_len() != bytes.len() || envelope.encode_to_vec() != bytes {
            return Err(FormatError::NonCanonical.into());
        }

        let token = Self { envelope };
        for block in token.signed_blocks() {
            if block.external_signature.is_some() {
                return Err(FormatError::Unsupported("third-party blocks").into());
            }
            if block.version.is_some_and(|version| version != 0) {
                return Err(FormatError::Unsupported("block signature versions above 0").into());
            }
        }
        Ok(token)
    }

    /// Encode the token.
    pub fn to_vec(&self) -> Vec<u8> {
        self.envelope.encode_to_vec()
    }

    /// Decode a token from URL-safe base64 with padding.
    pub fn from_base64(text: &str) -> Result<Self, TokenError> {
        let bytes = URL_SAFE.decode(text.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Encode the token as URL-safe base64 with padding.
    pub fn to_base64(&self) -> String {
        URL_SAFE.encode(self.to_vec())
    }

    /// The root key id hint carried by the token, if any.
    pub fn root_key_id(&self) -> Option<u32> {
        self.envelope.root_key_id
    }

    /// Number of blocks, including the authority block.
    pub fn block_count(&self) -> usize {
        1 + self.envelope.blocks.len()
    }

    /// Whether the token carries a final signature instead of a chaining
    /// secret.
    pub fn is_sealed(&self) -> bool {
        matches!(
            self.envelope.proof.content,
            Some(ProofContent::FinalSignature(_))
        )
    }

    fn signed_blocks(&self) -> impl Iterator<Item = &schema::SignedBlock> {
        std::iter::once(&self.envelope.authority).chain(&self.envelope.blocks)
    }

    fn last_block(&self) -> &schema::SignedBlock {
        self.envelope
            .blocks
            .last()
            .unwrap_or(&self.envelope.authority)
    }

    /// Verify the signature chain and the proof, then decode every block into
    /// a fresh [`AuthorizerContext`] tagged with block scopes.
    pub fn verify<R>(&self, root: &R) -> Result<AuthorizerContext, TokenError>
    where
        R: RootKeyProvider + ?Sized,
    {
        let mut key = root.root_key(self.envelope.root_key_id)?;
        for (index, block) in self.signed_blocks().enumerate() {
            let next = published_key(index, &block.next_key)?;
            key.verify(&block_payload(&block.block, &block.next_key), &block.signature)
                .map_err(|_| SignatureError::InvalidSignature { block: index })?;
            key = next;
        }
        self.verify_proof(&key)?;

        let mut context = AuthorizerContext::new();
        for (index, block) in self.blocks()?.iter().enumerate() {
            block.load_into(Scope::Block(index), &mut context);
        }
        tracing::debug!(
            blocks = self.block_count(),
            sealed = self.is_sealed(),
            "Token verified"
        );
        Ok(context)
    }

    fn verify_proof(&self, last_key: &PublicKey) -> Result<(), SignatureError> {
        match &self.envelope.proof.content {
            Some(ProofContent::NextSecret(secret)) => {
                let secret = KeyPair::from_bytes(secret).map_err(|_| SignatureError::InvalidProof)?;
                if secret.public() != *last_key {
                    return Err(SignatureError::InvalidProof);
                }
                Ok(())
            }
            Some(ProofContent::FinalSignature(signature)) => last_key
                .verify(&seal_payload(self.last_block()), signature)
                .map_err(|_| SignatureError::InvalidProof),
            None => Err(SignatureError::MissingProof),
        }
    }

    /// Decode the content of every block without verifying signatures.
    ///
    /// Use [`Token::verify`] before trusting anything returned here.
    pub fn blocks(&self) -> Result<Vec<Block>, FormatError> {
        let mut symbols = SymbolTable::new();
        self.signed_blocks()
            .map(|signed| -> Result<Block, FormatError> {
                let block = schema::Block::decode(signed.block.as_slice())?;
                convert::decode_block(block, &mut symbols)
            })
            .collect()
    }

    fn symbol_table(&self) -> Result<SymbolTable, FormatError> {
        let mut symbols = SymbolTable::new();
        for signed in self.signed_blocks() {
            symbols.extend(&schema::Block::decode(signed.block.as_slice())?.symbols)?;
        }
        Ok(symbols)
    }

    fn chaining_secret(&self) -> Result<KeyPair, TokenError> {
        let secret = match &self.envelope.proof.content {
            Some(ProofContent::NextSecret(secret)) => {
                KeyPair::from_bytes(secret).map_err(|_| SignatureError::InvalidProof)?
            }
            Some(ProofContent::FinalSignature(_)) => return Err(TokenError::Sealed),
            None => return Err(SignatureError::MissingProof.into()),
        };
        if secret.public().to_bytes().as_slice() != self.last_block().next_key.key.as_slice() {
            return Err(SignatureError::InvalidProof.into());
        }
        Ok(secret)
    }

    /// Append a block signed with this token's chaining secret.
    ///
    /// No private key other than the one carried by the token is needed.
    /// The new token publishes a freshly generated chaining key.
    pub fn append(&self, block: BlockBuilder) -> Result<Token, TokenError> {
        self.append_with_key(block, KeyPair::generate()?)
    }

    /// Append a block, publishing `next` as the following chaining key.
    pub fn append_with_key(&self, block: BlockBuilder, next: KeyPair) -> Result<Token, TokenError> {
        let secret = self.chaining_secret()?;
        let mut symbols = self.symbol_table()?;
        let data = convert::encode_block(&block.build(), &mut symbols)?.encode_to_vec();

        let mut envelope = self.envelope.clone();
        envelope
            .blocks
            .push(sign_block(&secret, data, &next.public()));
        envelope.proof = schema::Proof {
            content: Some(ProofContent::NextSecret(next.to_bytes().to_vec())),
        };
        tracing::debug!(blocks = envelope.blocks.len() + 1, "Appended block");
        Ok(Token { envelope })
    }

    /// Replace the chaining secret with a final signature so the token can
    /// no longer be extended.
    pub fn seal(&self) -> Result<Token, TokenError> {
        let secret = self.chaining_secret()?;
        let signature = secret.sign(&seal_payload(self.last_block()));

        let mut envelope = self.envelope.clone();
        envelope.proof = schema::Proof {
            content: Some(ProofContent::FinalSignature(signature.to_vec())),
        };
        Ok(Token { envelope })
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("root_key_id", &self.envelope.root_key_id)
            .field("blocks", &self.block_count())
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}

/// Decode `bytes` and verify the result against the root key provided by
/// `root`.
pub fn verify<R>(bytes: &[u8], root: &R) -> Result<(Token, AuthorizerContext), TokenError>
where
    R: RootKeyProvider + ?Sized,
{
    let token = Token::from_bytes(bytes)?;
    let context = token.verify(root)?;
    Ok((token, context))
}

/// Issues new tokens from an authority block.
#[derive(Debug, Clone, Default)]
pub struct TokenBuilder {
    authority: BlockBuilder,
    root_key_id: Option<u32>,
}

impl TokenBuilder {
    /// Start a token with `authority` as its first block.
    pub fn new(authority: BlockBuilder) -> Self {
        Self {
            authority,
            root_key_id: None,
        }
    }

    /// Record which root key signed the token.
    pub fn with_root_key_id(mut self, root_key_id: u32) -> Self {
        self.root_key_id = Some(root_key_id);
        self
    }

    /// Sign the authority block with `root`.
    pub fn build(self, root: &KeyPair) -> Result<Token, TokenError> {
        self.build_with_key(root, KeyPair::generate()?)
    }

    /// Sign the authority block with `root`, publishing `next` as the first
    /// chaining key.
    pub fn build_with_key(self, root: &KeyPair, next: KeyPair) -> Result<Token, TokenError> {
        let mut symbols = SymbolTable::new();
        let data = convert::encode_block(&self.authority.build(), &mut symbols)?.encode_to_vec();
        let envelope = schema::Biscuit {
            root_key_id: self.root_key_id,
            authority: sign_block(root, data, &next.public()),
            blocks: Vec::new(),
            proof: schema::Proof {
                content: Some(ProofContent::NextSecret(next.to_bytes().to_vec())),
            },
        };
        tracing::debug!(root = %root.public(), "Issued token");
        Ok(Token { envelope })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_datalog::{Fact, RunLimits};
    use testresult::TestResult;

    fn root() -> KeyPair {
        KeyPair::from_seed([42; 32])
    }

    fn issue() -> TestResult<Token> {
        Ok(TokenBuilder::new(
            BlockBuilder::new().with_fact(Fact::new("k8s:userinfo:username", ["alice"])),
        )
        .build_with_key(&root(), KeyPair::from_seed([1; 32]))?)
    }

    #[test]
    fn it_verifies_freshly_issued_tokens() -> TestResult {
        let token = issue()?;
        let context = token.verify(&root().public())?;
        assert_eq!(context.fact_count(), 1);
        Ok(())
    }

    #[test]
    fn it_rejects_tokens_signed_by_another_root() -> TestResult {
        let other = KeyPair::from_seed([43; 32]).public();
        assert!(matches!(
            issue()?.verify(&other),
            Err(TokenError::Signature(SignatureError::InvalidSignature { block: 0 }))
        ));
        Ok(())
    }

    #[test]
    fn it_refuses_to_extend_sealed_tokens() -> TestResult {
        let sealed = issue()?.seal()?;
        assert!(sealed.is_sealed());
        sealed.verify(&root().public())?;
        assert!(matches!(
            sealed.append(BlockBuilder::new()),
            Err(TokenError::Sealed)
        ));
        assert!(matches!(sealed.seal(), Err(TokenError::Sealed)));
        Ok(())
    }

    #[test]
    fn it_rejects_a_proof_that_does_not_close_the_chain() -> TestResult {
        let mut token = issue()?;
        token.envelope.proof.content = Some(ProofContent::NextSecret(vec![9; 32]));
        assert!(matches!(
            token.verify(&root().public()),
            Err(TokenError::Signature(SignatureError::InvalidProof))
        ));

        token.envelope.proof.content = None;
        assert!(matches!(
            token.verify(&root().public()),
            Err(TokenError::Signature(SignatureError::MissingProof))
        ));
        Ok(())
    }

    #[test]
    fn it_rejects_non_canonical_encodings() -> TestResult {
        let mut bytes = issue()?.to_vec();
        // An unknown varint field decodes fine but is not part of the token.
        bytes.extend_from_slice(&[0x48, 0x01]);
        assert!(matches!(
            Token::from_bytes(&bytes),
            Err(TokenError::Format(FormatError::NonCanonical))
        ));
        Ok(())
    }

    #[test]
    fn it_redacts_the_chaining_secret_from_debug_output() -> TestResult {
        let printed = format!("{:?}", issue()?);
        assert_eq!(printed, "Token { root_key_id: None, blocks: 1, sealed: false, .. }");
        Ok(())
    }

    #[test]
    fn it_keeps_evaluation_separate_per_verification() -> TestResult {
        let token = issue()?;
        let first = token.verify(&root().public())?;
        let second = token.verify(&root().public())?;
        assert!(first.evaluate(&RunLimits::default())?.into_outcome().is_err());
        assert_eq!(second.fact_count(), 1);
        Ok(())
    }
}
