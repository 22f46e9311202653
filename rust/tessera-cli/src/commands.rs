//! One function per subcommand. Each returns the text to print.

use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use tessera_credentials::{KeyPair, PublicKey, PublicKeyFile};
use tessera_datalog::{Check, Fact, RunLimits, parse_check, parse_fact};
use tessera_kube::{
    Constraints, Decision, GROUP, RequestAttributes, USERNAME, attenuate_with_checks, authorize,
};
use tessera_token::{BlockBuilder, Token, TokenBuilder};
use tessera_webhook::{DEFAULT_PUBLIC_KEY_FILE, WebhookSettings};

use crate::args::{
    AttenuateArgs, AuthorizeArgs, DEFAULT_PRIVATE_KEY_FILE, GenkeyArgs, GentokenArgs,
    InspectArgs, RunArgs,
};

pub fn genkey(args: &GenkeyArgs) -> Result<String> {
    let private_key_file = args.out.join(DEFAULT_PRIVATE_KEY_FILE);
    let public_key_file = args.out.join(DEFAULT_PUBLIC_KEY_FILE);
    if !args.force {
        for path in [&private_key_file, &public_key_file] {
            if path.exists() {
                bail!("{} already exists; pass --force to replace it", path.display());
            }
        }
    }

    let key = KeyPair::generate().context("generating root key")?;
    key.write_pem_file(&private_key_file)
        .context("writing private key")?;
    key.public()
        .write_file(&public_key_file)
        .context("writing public key")?;
    tracing::info!(public_key = %key.public(), "Generated root key");
    Ok(format!(
        "wrote {} and {}",
        private_key_file.display(),
        public_key_file.display()
    ))
}

pub fn gentoken(args: &GentokenArgs) -> Result<String> {
    let root = KeyPair::read_pem_file(&args.private_key_file).context("reading private key")?;

    let mut authority = BlockBuilder::new().with_fact(Fact::new(USERNAME, [args.username.as_str()]));
    for group in &args.groups {
        authority.add_fact(Fact::new(GROUP, [group.as_str()]));
    }
    for fact in &args.facts {
        authority.add_fact(parse_fact(fact).with_context(|| format!("parsing fact {fact:?}"))?);
    }
    if let Some(context) = &args.context {
        authority.set_context(context.as_str());
    }

    let mut builder = TokenBuilder::new(authority);
    if let Some(root_key_id) = args.root_key_id {
        builder = builder.with_root_key_id(root_key_id);
    }
    let token = builder.build(&root).context("issuing token")?;
    Ok(token.to_base64())
}

pub fn attenuate(args: &AttenuateArgs) -> Result<String> {
    let token = Token::from_base64(&args.token).context("decoding token")?;
    let constraints = Constraints {
        resources: args.resources.iter().cloned().collect(),
        namespaces: args.namespaces.iter().cloned().collect(),
        names: args.names.iter().cloned().collect(),
        verbs: args.verbs.iter().cloned().collect(),
    };
    let checks = args
        .checks
        .iter()
        .map(|check| parse_check(check).with_context(|| format!("parsing check {check:?}")))
        .collect::<Result<Vec<Check>>>()?;

    let attenuated =
        attenuate_with_checks(&token, &constraints, checks).context("attenuating token")?;
    Ok(attenuated.to_base64())
}

pub fn authorize_request(args: &AuthorizeArgs) -> Result<String> {
    let token = Token::from_base64(&args.token).context("decoding token")?;
    let root = PublicKeyFile::new(&args.public_key_file);
    let attributes = RequestAttributes {
        resource: args.resource.clone(),
        namespace: args.namespace.clone(),
        name: args.name.clone(),
        verb: args.verb.clone(),
    };

    let decision = authorize(&token, &root, &attributes, &RunLimits::from(args.limits))
        .context("authorizing token")?;
    Ok(match decision {
        Decision::NoOpinion => "allowed".to_string(),
        Decision::Deny { reason } => format!("forbidden: {reason}"),
    })
}

pub fn inspect(args: &InspectArgs) -> Result<String> {
    let token = Token::from_base64(&args.token).context("decoding token")?;
    let mut out = String::new();

    writeln!(out, "blocks: {}", token.block_count())?;
    writeln!(out, "sealed: {}", token.is_sealed())?;
    if let Some(root_key_id) = token.root_key_id() {
        writeln!(out, "root key id: {root_key_id}")?;
    }
    for (index, block) in token.blocks().context("decoding blocks")?.iter().enumerate() {
        writeln!(out, "\nblock {index}:")?;
        write!(out, "{block}")?;
    }

    if let Some(path) = &args.public_key_file {
        let root = PublicKey::read_file(path).context("reading public key")?;
        match token.verify(&root) {
            Ok(_) => writeln!(out, "\nsignature: valid ({root})")?,
            Err(error) => writeln!(out, "\nsignature: invalid: {error}")?,
        }
    }
    Ok(out)
}

pub async fn run(args: &RunArgs) -> Result<()> {
    let settings = WebhookSettings {
        listen_addr: args.addr,
        public_key_file: args.public_key_file.clone(),
        limits: RunLimits::from(args.limits),
        max_body_bytes: args.max_body_bytes,
    };
    if !settings.public_key_file.exists() {
        tracing::warn!(
            path = %settings.public_key_file.display(),
            "Public key file does not exist yet; every token will be rejected until it does"
        );
    }
    tessera_webhook::run(settings)
        .await
        .context("running webhook server")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::LimitArgs;
    use testresult::TestResult;

    fn limits() -> LimitArgs {
        LimitArgs {
            max_facts: None,
            max_iterations: None,
            max_matches: None,
            max_unifications: None,
        }
    }

    fn keys(dir: &std::path::Path) -> TestResult {
        genkey(&GenkeyArgs {
            out: dir.to_path_buf(),
            force: false,
        })?;
        Ok(())
    }

    fn issue(dir: &std::path::Path) -> TestResult<String> {
        Ok(gentoken(&GentokenArgs {
            username: "alice".into(),
            groups: vec!["ops".into()],
            private_key_file: dir.join(DEFAULT_PRIVATE_KEY_FILE),
            facts: vec![r#"team("payments")"#.into()],
            context: Some("issued by tests".into()),
            root_key_id: None,
        })?)
    }

    fn authorize_verb(dir: &std::path::Path, token: &str, verb: &str) -> TestResult<String> {
        Ok(authorize_request(&AuthorizeArgs {
            token: token.into(),
            public_key_file: dir.join(DEFAULT_PUBLIC_KEY_FILE),
            resource: "pods".into(),
            namespace: "default".into(),
            name: String::new(),
            verb: verb.into(),
            limits: limits(),
        })?)
    }

    #[test]
    fn it_refuses_to_overwrite_keys() -> TestResult {
        let dir = tempfile::tempdir()?;
        keys(dir.path())?;
        let again = genkey(&GenkeyArgs {
            out: dir.path().to_path_buf(),
            force: false,
        });
        assert!(again.is_err());
        genkey(&GenkeyArgs {
            out: dir.path().to_path_buf(),
            force: true,
        })?;
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn it_writes_a_private_key_only_the_owner_can_read() -> TestResult {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        keys(dir.path())?;
        let metadata = std::fs::metadata(dir.path().join(DEFAULT_PRIVATE_KEY_FILE))?;
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
        assert_eq!(
            std::fs::read(dir.path().join(DEFAULT_PUBLIC_KEY_FILE))?.len(),
            32
        );
        Ok(())
    }

    #[test]
    fn it_issues_attenuates_and_authorizes() -> TestResult {
        let dir = tempfile::tempdir()?;
        keys(dir.path())?;
        let token = issue(dir.path())?;
        assert_eq!(authorize_verb(dir.path(), &token, "delete")?, "allowed");

        let attenuated = attenuate(&AttenuateArgs {
            token,
            resources: Vec::new(),
            namespaces: vec!["default".into()],
            names: Vec::new(),
            verbs: vec!["get".into()],
            checks: vec![r#"check if k8s:resource("pods")"#.into()],
        })?;
        assert_eq!(authorize_verb(dir.path(), &attenuated, "get")?, "allowed");
        assert_eq!(
            authorize_verb(dir.path(), &attenuated, "delete")?,
            r#"forbidden: check failed in block 1: check if k8s:verb("get")"#
        );
        Ok(())
    }

    #[test]
    fn it_reports_check_parse_errors() -> TestResult {
        let dir = tempfile::tempdir()?;
        keys(dir.path())?;
        let result = attenuate(&AttenuateArgs {
            token: issue(dir.path())?,
            resources: Vec::new(),
            namespaces: Vec::new(),
            names: Vec::new(),
            verbs: Vec::new(),
            checks: vec!["check if".into()],
        });
        let error = result.expect_err("an incomplete check does not parse");
        assert!(format!("{error:#}").contains("parsing check"));
        Ok(())
    }

    #[test]
    fn it_inspects_and_verifies() -> TestResult {
        let dir = tempfile::tempdir()?;
        keys(dir.path())?;
        let output = inspect(&InspectArgs {
            token: issue(dir.path())?,
            public_key_file: Some(dir.path().join(DEFAULT_PUBLIC_KEY_FILE)),
        })?;
        assert!(output.contains("blocks: 1"));
        assert!(output.contains(r#"k8s:userinfo:username("alice")"#));
        assert!(output.contains("signature: valid"));
        Ok(())
    }
}
