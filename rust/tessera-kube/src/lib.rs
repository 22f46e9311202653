//! Kubernetes authentication and authorization with Tessera tokens.
//!
//! The authority block of a token names a user through
//! `k8s:userinfo:username` and `k8s:userinfo:group` facts. Attenuation
//! blocks add checks over the `k8s:resource`, `k8s:namespace`, `k8s:name`
//! and `k8s:verb` facts of each request. A token never grants access by
//! itself: [`authorize`] either has no opinion or denies.
//!
//! ```
//! use tessera_credentials::KeyPair;
//! use tessera_datalog::{Fact, RunLimits};
//! use tessera_kube::{Constraints, Decision, RequestAttributes, attenuate, authorize};
//! use tessera_token::{BlockBuilder, TokenBuilder};
//!
//! let root = KeyPair::generate().unwrap();
//! let token = TokenBuilder::new(
//!     BlockBuilder::new().with_fact(Fact::new("k8s:userinfo:username", ["alice"])),
//! )
//! .build(&root)
//! .unwrap();
//! let read_only = attenuate(&token, &Constraints::new().with_verb("get")).unwrap();
//!
//! let decision = authorize(
//!     &read_only,
//!     &root.public(),
//!     &RequestAttributes::verb("delete"),
//!     &RunLimits::default(),
//! )
//! .unwrap();
//! assert!(decision.is_deny());
//! ```

#![warn(missing_docs)]

mod ambient;
mod attenuate;
mod authorize;
mod error;
mod identity;
pub mod review;

pub use ambient::{NAME, NAMESPACE, RESOURCE, RequestAttributes, VERB, ambient_context, ambient_facts};
pub use attenuate::{Constraints, attenuate, attenuate_with_checks};
pub use authorize::{Decision, authenticate, authorize};
pub use error::{IdentityError, KubeError};
pub use identity::{GROUP, Identity, USERNAME, identity};
pub use review::{authenticate_review, authorize_review};
