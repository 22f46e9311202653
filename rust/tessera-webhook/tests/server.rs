//! Exercises the webhook over real HTTP.

use std::net::SocketAddr;

use serde_json::{Value, json};
use tessera_credentials::KeyPair;
use tessera_datalog::{Fact, Predicate, Query, Rule, RunLimits, Term};
use tessera_kube::{Constraints, attenuate};
use tessera_token::{BlockBuilder, TokenBuilder};
use tessera_webhook::{Webhook, WebhookServer, WebhookSettings};
use testresult::TestResult;

struct Fixture {
    server: WebhookServer,
    root: KeyPair,
    dir: tempfile::TempDir,
}

async fn start() -> TestResult<Fixture> {
    start_with(WebhookSettings::default()).await
}

async fn start_with(settings: WebhookSettings) -> TestResult<Fixture> {
    let root = KeyPair::from_seed([31; 32]);
    let dir = tempfile::tempdir()?;
    let settings = WebhookSettings {
        public_key_file: dir.path().join("tessera-key.pub"),
        ..settings
    };
    root.public().write_file(&settings.public_key_file)?;

    let local: SocketAddr = "127.0.0.1:0".parse()?;
    let server = WebhookServer::start(local, Webhook::from_settings(&settings)).await?;
    Ok(Fixture {
        server,
        root,
        dir,
    })
}

fn token(root: &KeyPair) -> TestResult<String> {
    let token = TokenBuilder::new(
        BlockBuilder::new()
            .with_fact(Fact::new("k8s:userinfo:username", ["alice"]))
            .with_fact(Fact::new("k8s:userinfo:group", ["ops"])),
    )
    .build(root)?;
    Ok(attenuate(&token, &Constraints::new().with_verb("get"))?.to_base64())
}

async fn post(endpoint: &str, path: &str, body: Value) -> TestResult<Value> {
    let response = reqwest::Client::new()
        .post(format!("{endpoint}{path}"))
        .json(&body)
        .send()
        .await?;
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    Ok(response.json().await?)
}

fn access_review(token: &str, verb: &str) -> Value {
    json!({
        "apiVersion": "authorization.k8s.io/v1",
        "kind": "SubjectAccessReview",
        "spec": {
            "resourceAttributes": {"namespace": "default", "verb": verb, "resource": "pods"},
            "user": "alice",
            "extra": {"authentication.tessera.io/token": [token]}
        }
    })
}

#[test_log::test(tokio::test)]
async fn it_answers_token_reviews() -> TestResult {
    let fixture = start().await?;
    let token = token(&fixture.root)?;

    let review = post(
        &fixture.server.endpoint,
        "/authenticate",
        json!({
            "apiVersion": "authentication.k8s.io/v1",
            "kind": "TokenReview",
            "spec": {"token": token}
        }),
    )
    .await?;
    assert_eq!(review["apiVersion"], "authentication.k8s.io/v1");
    assert_eq!(review["kind"], "TokenReview");
    assert_eq!(review["status"]["authenticated"], true);
    assert_eq!(review["status"]["user"]["username"], "alice");
    assert_eq!(review["status"]["user"]["groups"], json!(["ops"]));
    assert_eq!(
        review["status"]["user"]["extra"]["authentication.tessera.io/token"],
        json!([token])
    );

    let rejected = post(
        &fixture.server.endpoint,
        "/authenticate",
        json!({"spec": {"token": "bm90IGEgdG9rZW4="}}),
    )
    .await?;
    assert_eq!(rejected["status"]["authenticated"], false);
    assert!(rejected["status"]["error"].as_str().is_some());

    fixture.server.stop().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_answers_access_reviews() -> TestResult {
    let fixture = start().await?;
    let token = token(&fixture.root)?;
    let endpoint = &fixture.server.endpoint;

    let allowed = post(endpoint, "/authorize", access_review(&token, "get")).await?;
    assert_eq!(allowed["apiVersion"], "authorization.k8s.io/v1");
    assert_eq!(allowed["status"], json!({"allowed": false}));

    let denied = post(endpoint, "/authorize", access_review(&token, "delete")).await?;
    assert_eq!(denied["status"]["denied"], true);
    assert_eq!(
        denied["status"]["reason"],
        r#"check failed in block 1: check if k8s:verb("get")"#
    );

    let anonymous = post(
        endpoint,
        "/authorize",
        json!({"spec": {"resourceAttributes": {"verb": "delete"}}}),
    )
    .await?;
    assert_eq!(anonymous["status"], json!({"allowed": false}));

    fixture.server.stop().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_rejects_bad_requests() -> TestResult {
    let fixture = start().await?;
    let endpoint = &fixture.server.endpoint;
    let client = reqwest::Client::new();

    let health = client.get(format!("{endpoint}/healthz")).send().await?;
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    let missing = client.get(format!("{endpoint}/nope")).send().await?;
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    let wrong_method = client.get(format!("{endpoint}/authorize")).send().await?;
    assert_eq!(wrong_method.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);

    let garbage = client
        .post(format!("{endpoint}/authenticate"))
        .body("{not json")
        .send()
        .await?;
    assert_eq!(garbage.status(), reqwest::StatusCode::BAD_REQUEST);

    fixture.server.stop().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_picks_up_a_rotated_root_key() -> TestResult {
    let fixture = start().await?;
    let rotated = KeyPair::from_seed([32; 32]);
    let public_key_file = fixture.dir.path().join("tessera-key.pub");
    rotated.public().write_file(&public_key_file)?;

    let review = post(
        &fixture.server.endpoint,
        "/authenticate",
        json!({"spec": {"token": token(&rotated)?}}),
    )
    .await?;
    assert_eq!(review["status"]["authenticated"], true);

    let stale = post(
        &fixture.server.endpoint,
        "/authenticate",
        json!({"spec": {"token": token(&fixture.root)?}}),
    )
    .await?;
    assert_eq!(stale["status"]["authenticated"], false);

    fixture.server.stop().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_rejects_oversized_reviews() -> TestResult {
    let fixture = start_with(WebhookSettings {
        max_body_bytes: 1024,
        ..WebhookSettings::default()
    })
    .await?;
    let endpoint = &fixture.server.endpoint;

    let padding = "x".repeat(4096);
    let oversized = reqwest::Client::new()
        .post(format!("{endpoint}/authenticate"))
        .json(&json!({"spec": {"token": padding}}))
        .send()
        .await?;
    assert_eq!(oversized.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);

    let review = post(
        endpoint,
        "/authenticate",
        json!({"spec": {"token": token(&fixture.root)?}}),
    )
    .await?;
    assert_eq!(review["status"]["authenticated"], true);

    fixture.server.stop().await;
    Ok(())
}

#[test_log::test(tokio::test)]
async fn it_denies_tokens_that_exhaust_the_work_budget() -> TestResult {
    let fixture = start_with(WebhookSettings {
        limits: RunLimits {
            max_unifications: 10_000,
            ..RunLimits::default()
        },
        ..WebhookSettings::default()
    })
    .await?;

    // 50 + 50 * 50 + 3 * 2500 unifications in the first round alone
    let mut block = BlockBuilder::new().with_fact(Fact::new("c", [1i64]));
    for i in 0..50i64 {
        block.add_fact(Fact::new("a", [i]));
    }
    block.add_rule(Rule::new(
        Predicate::new("h", [1i64]),
        Query::new([
            Predicate::new("a", [Term::var("x")]),
            Predicate::new("a", [Term::var("y")]),
            Predicate::new("c", [1i64]),
            Predicate::new("c", [1i64]),
            Predicate::new("c", [1i64]),
        ]),
    )?);
    let issued = TokenBuilder::new(
        BlockBuilder::new().with_fact(Fact::new("k8s:userinfo:username", ["alice"])),
    )
    .build(&fixture.root)?;
    let expensive = issued.append(block)?.to_base64();

    let denied = post(
        &fixture.server.endpoint,
        "/authorize",
        access_review(&expensive, "get"),
    )
    .await?;
    assert_eq!(denied["status"]["denied"], true);
    assert_eq!(
        denied["status"]["evaluationError"],
        "Evaluation exceeded the unification limit of 10000"
    );

    let health = reqwest::get(format!("{}/healthz", fixture.server.endpoint)).await?;
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    fixture.server.stop().await;
    Ok(())
}
