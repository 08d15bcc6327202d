mod common;

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use scanbox::{
    AnalysisError, Config, DockerApi, ImageCache, RegistryAuth, RegistryCredentials, RunId,
};
use common::{Call, FakeEngine};

fn api_with(engine: Arc<FakeEngine>, cfg: Config, creds: RegistryCredentials) -> DockerApi {
    DockerApi::with_credentials(engine, cfg, RunId::new(), creds)
}

#[test]
fn test_pull_is_noop_when_docker_disabled() {
    let engine = Arc::new(FakeEngine::new());
    let cfg = Config {
        disable_docker: true,
        ..Config::default()
    };
    let api = api_with(engine.clone(), cfg, RegistryCredentials::default());
    api.pull_image("docker.io/scanbox/bandit:1").expect("noop");
    assert!(engine.calls().is_empty(), "no engine calls expected");
}

#[test]
fn test_cached_image_is_not_pulled() {
    let engine = Arc::new(FakeEngine {
        cached_images: vec!["scanbox/bandit:1".to_string()],
        ..FakeEngine::new()
    });
    let api = api_with(engine.clone(), Config::default(), RegistryCredentials::default());
    api.pull_image("docker.io/scanbox/bandit:1").expect("cached");
    assert_eq!(
        engine.calls(),
        vec![Call::ListImages("scanbox/bandit:1".to_string())],
        "lookup strips the default registry and no pull follows"
    );
}

#[test]
fn test_missing_image_pulled_once_with_exact_reference() {
    let engine = Arc::new(FakeEngine::new());
    let api = api_with(engine.clone(), Config::default(), RegistryCredentials::default());
    api.pull_image("docker.io/scanbox/gosec:2").expect("pull");
    let pulls: Vec<Call> = engine
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Pull(..)))
        .collect();
    assert_eq!(pulls.len(), 1);
    match &pulls[0] {
        Call::Pull(reference, opts) => {
            assert_eq!(reference, "docker.io/scanbox/gosec:2");
            assert_eq!(opts.registry_auth, None);
        }
        other => panic!("unexpected call {other:?}"),
    }
}

#[test]
fn test_pull_sends_auth_only_with_user_and_password() {
    let engine = Arc::new(FakeEngine::new());
    let creds = RegistryCredentials {
        username: "ci".to_string(),
        password: "s3cret".to_string(),
        server_address: "registry.local:5000".to_string(),
    };
    let api = api_with(engine.clone(), Config::default(), creds);
    api.pull_image("registry.local:5000/tools/semgrep:1").expect("pull");

    let token = engine
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::Pull(_, opts) => opts.registry_auth,
            _ => None,
        })
        .expect("auth token present");
    let decoded: serde_json::Value =
        serde_json::from_slice(&URL_SAFE.decode(token).expect("base64")).expect("json");
    assert_eq!(
        decoded,
        serde_json::json!({
            "username": "ci",
            "password": "s3cret",
            "serveraddress": "registry.local:5000"
        })
    );

    let engine = Arc::new(FakeEngine::new());
    let creds = RegistryCredentials {
        username: String::new(),
        password: "s3cret".to_string(),
        server_address: "registry.local:5000".to_string(),
    };
    let api = api_with(engine.clone(), Config::default(), creds);
    api.pull_image("alpine:3").expect("pull");
    assert!(engine
        .calls()
        .iter()
        .all(|c| !matches!(c, Call::Pull(_, o) if o.registry_auth.is_some())));
}

#[test]
fn test_broken_pull_stream_is_an_error() {
    let engine = Arc::new(FakeEngine {
        pull_stream_breaks: true,
        ..FakeEngine::new()
    });
    let api = api_with(engine, Config::default(), RegistryCredentials::default());
    let err = api.pull_image("alpine:3").expect_err("read failure");
    assert!(matches!(err, AnalysisError::Engine(_)), "got {err:?}");
}

#[test]
fn test_list_failure_surfaces_as_engine_error_and_skips_pull() {
    let engine = Arc::new(FakeEngine {
        list_images_fails: true,
        ..FakeEngine::new()
    });
    let api = api_with(engine.clone(), Config::default(), RegistryCredentials::default());
    let err = api.pull_image("alpine:3").expect_err("list failure");
    assert!(matches!(err, AnalysisError::Engine(_)));
    assert_eq!(engine.count(|c| matches!(c, Call::Pull(..))), 0);
}

#[test]
fn test_lock_released_after_failed_lookup() {
    let engine = Arc::new(FakeEngine {
        list_images_fails: true,
        ..FakeEngine::new()
    });
    let lock = Arc::new(Mutex::new(()));
    let cache = ImageCache::new(engine, Arc::clone(&lock));
    assert!(cache.is_missing("alpine:3").is_err());
    assert!(lock.try_lock().is_ok(), "lock must be free after an error");
}

#[test]
fn test_concurrent_checks_may_both_pull() {
    let engine = Arc::new(FakeEngine::new());
    let api = Arc::new(api_with(
        engine.clone(),
        Config::default(),
        RegistryCredentials::default(),
    ));
    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let api = Arc::clone(&api);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                api.pull_image("docker.io/scanbox/trivy:0.50")
            })
        })
        .collect();
    for h in handles {
        h.join().expect("join").expect("pull");
    }
    // The fake never caches, so every caller sees the image as missing.
    assert_eq!(engine.count(|c| matches!(c, Call::ListImages(_))), 4);
    assert_eq!(engine.count(|c| matches!(c, Call::Pull(..))), 4);
}

#[test]
fn test_registry_auth_encode_is_url_safe_json() {
    let auth = RegistryAuth {
        username: "a".into(),
        password: "b?>".into(),
        server_address: String::new(),
    };
    let token = auth.encode().expect("encode");
    assert!(!token.contains('+') && !token.contains('/'));
    let back: RegistryAuth =
        serde_json::from_slice(&URL_SAFE.decode(token).expect("b64")).expect("json");
    assert_eq!(back, auth);
}
