use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tessera_datalog::RunLimits;
use tessera_webhook::{DEFAULT_LISTEN_ADDR, DEFAULT_MAX_BODY_BYTES, DEFAULT_PUBLIC_KEY_FILE};

/// Default location of the PKCS#8 private key.
pub const DEFAULT_PRIVATE_KEY_FILE: &str = "tessera-key.pem";

/// Issue, attenuate and check Tessera tokens for Kubernetes
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true, env = "TESSERA_VERBOSE")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a root key pair
    Genkey(GenkeyArgs),
    /// Issue a token for a Kubernetes user
    Gentoken(GentokenArgs),
    /// Append a block restricting what a token may do
    Attenuate(AttenuateArgs),
    /// Evaluate a token against one request
    Authorize(AuthorizeArgs),
    /// Print the content of a token
    Inspect(InspectArgs),
    /// Run the authentication and authorization webhook server
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct GenkeyArgs {
    /// Directory to write `tessera-key.pem` and `tessera-key.pub` into
    #[arg(long, env = "TESSERA_OUT", default_value = ".")]
    pub out: PathBuf,

    /// Overwrite existing key files
    #[arg(long, env = "TESSERA_FORCE")]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct GentokenArgs {
    /// Kubernetes username
    #[arg(long, env = "TESSERA_USERNAME")]
    pub username: String,

    /// Group membership; repeat for several groups. `TESSERA_GROUPS` takes
    /// a comma separated list
    #[arg(
        long = "group",
        alias = "groups",
        env = "TESSERA_GROUPS",
        value_delimiter = ','
    )]
    pub groups: Vec<String>,

    /// Root private key
    #[arg(long, env = "TESSERA_PRIVATE_KEY_FILE", default_value = DEFAULT_PRIVATE_KEY_FILE)]
    pub private_key_file: PathBuf,

    /// Additional authority fact, e.g. `team("payments")`; repeat for
    /// several facts. Facts contain commas, so `TESSERA_FACTS` holds exactly
    /// one fact
    #[arg(long = "fact", env = "TESSERA_FACTS")]
    pub facts: Vec<String>,

    /// Free form context string stored in the authority block
    #[arg(long, env = "TESSERA_CONTEXT")]
    pub context: Option<String>,

    /// Identifier of the root key, for verifiers holding several keys
    #[arg(long, env = "TESSERA_ROOT_KEY_ID")]
    pub root_key_id: Option<u32>,
}

#[derive(Args, Debug)]
pub struct AttenuateArgs {
    /// Base64 token to attenuate
    #[arg(long, env = "TESSERA_TOKEN")]
    pub token: String,

    /// Allowed resource; repeat to allow several
    #[arg(long = "resource")]
    pub resources: Vec<String>,

    /// Allowed namespace; repeat to allow several
    #[arg(long = "namespace")]
    pub namespaces: Vec<String>,

    /// Allowed object name; repeat to allow several
    #[arg(long = "name")]
    pub names: Vec<String>,

    /// Allowed verb; repeat to allow several
    #[arg(long = "verb")]
    pub verbs: Vec<String>,

    /// Additional check, e.g. `check if k8s:resource("pods")`
    #[arg(long = "check")]
    pub checks: Vec<String>,
}

#[derive(Args, Debug)]
pub struct AuthorizeArgs {
    /// Base64 token
    #[arg(long, env = "TESSERA_TOKEN")]
    pub token: String,

    /// Root public key
    #[arg(long, env = "TESSERA_PUBLIC_KEY_FILE", default_value = DEFAULT_PUBLIC_KEY_FILE)]
    pub public_key_file: PathBuf,

    /// Requested resource type
    #[arg(long, env = "TESSERA_RESOURCE", default_value = "")]
    pub resource: String,

    /// Request namespace
    #[arg(long, env = "TESSERA_NAMESPACE", default_value = "")]
    pub namespace: String,

    /// Requested object name
    #[arg(long, env = "TESSERA_NAME", default_value = "")]
    pub name: String,

    /// Request verb
    #[arg(long, env = "TESSERA_VERB", default_value = "")]
    pub verb: String,

    #[command(flatten)]
    pub limits: LimitArgs,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Base64 token
    #[arg(long, env = "TESSERA_TOKEN")]
    pub token: String,

    /// Verify the token against this root public key
    #[arg(long, env = "TESSERA_PUBLIC_KEY_FILE")]
    pub public_key_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Address to listen on
    #[arg(long, env = "TESSERA_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    pub addr: SocketAddr,

    /// Root public key, re-read for every request
    #[arg(long, env = "TESSERA_PUBLIC_KEY_FILE", default_value = DEFAULT_PUBLIC_KEY_FILE)]
    pub public_key_file: PathBuf,

    /// Largest review request body accepted, in bytes
    #[arg(long, env = "TESSERA_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    #[command(flatten)]
    pub limits: LimitArgs,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct LimitArgs {
    /// Maximum number of facts per evaluation
    #[arg(long, env = "TESSERA_MAX_FACTS")]
    pub max_facts: Option<usize>,

    /// Maximum number of rule iterations per evaluation
    #[arg(long, env = "TESSERA_MAX_ITERATIONS")]
    pub max_iterations: Option<usize>,

    /// Maximum number of partial matches per query
    #[arg(long, env = "TESSERA_MAX_MATCHES")]
    pub max_matches: Option<usize>,

    /// Maximum number of fact unifications per evaluation
    #[arg(long, env = "TESSERA_MAX_UNIFICATIONS")]
    pub max_unifications: Option<usize>,
}

impl From<LimitArgs> for RunLimits {
    fn from(args: LimitArgs) -> Self {
        let defaults = RunLimits::default();
        RunLimits {
            max_facts: args.max_facts.unwrap_or(defaults.max_facts),
            max_iterations: args.max_iterations.unwrap_or(defaults.max_iterations),
            max_matches: args.max_matches.unwrap_or(defaults.max_matches),
            max_unifications: args.max_unifications.unwrap_or(defaults.max_unifications),
        }
    }
}
