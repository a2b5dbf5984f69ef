//! Checks that the compose file, the env template and the config loader agree.

use std::{collections::BTreeSet, fs, path::PathBuf};

use regex::Regex;

fn repo_file(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

/// Keys in `.env.example`, including commented-out ones such as `# FORWARD_TO_ID=`.
fn env_example_keys() -> BTreeSet<String> {
    let re = Regex::new(r"(?m)^#?\s*([A-Z][A-Z0-9_]*)=").unwrap();
    re.captures_iter(&repo_file(".env.example"))
        .map(|c| c[1].to_string())
        .collect()
}

/// Upper-case string literals in the non-test part of the config loader.
fn config_keys() -> BTreeSet<String> {
    let src = repo_file("crates/rentbot-core/src/config.rs");
    let body = src.split("#[cfg(test)]").next().unwrap();
    let re = Regex::new(r#""([A-Z][A-Z0-9]*_[A-Z0-9_]+|KEYWORDS)""#).unwrap();
    re.captures_iter(body).map(|c| c[1].to_string()).collect()
}

#[test]
fn compose_variables_are_documented() {
    let compose = repo_file("docker-compose.yml");
    let documented = env_example_keys();
    let re = Regex::new(r"\$\{([A-Z][A-Z0-9_]*)").unwrap();

    let referenced: BTreeSet<String> = re
        .captures_iter(&compose)
        .map(|c| c[1].to_string())
        .collect();
    assert!(referenced.contains("BOT_TOKEN"));

    let missing: Vec<_> = referenced.difference(&documented).collect();
    assert!(missing.is_empty(), "missing from .env.example: {missing:?}");
}

#[test]
fn config_variables_are_documented() {
    let documented = env_example_keys();
    let mut keys = config_keys();
    for expected in ["BOT_TOKEN", "OWNER_ID", "OPENAI_API_KEY", "HTTPS_PROXY", "KEYWORDS"] {
        assert!(keys.contains(expected), "config loader no longer reads {expected}");
    }
    keys.insert("RUST_LOG".to_string());

    let missing: Vec<_> = keys.difference(&documented).collect();
    assert!(missing.is_empty(), "missing from .env.example: {missing:?}");
}

#[test]
fn compose_publishes_no_ports() {
    let compose = repo_file("docker-compose.yml");
    assert!(
        !compose.lines().any(|l| l.trim_start().starts_with("ports:")),
        "long polling needs no inbound ports"
    );
    assert!(!repo_file("Dockerfile").contains("EXPOSE"));
}

#[test]
fn builder_image_is_not_pinned_without_a_lockfile() {
    let dockerfile = repo_file("Dockerfile");
    let re = Regex::new(r"(?m)^FROM rust:([0-9.]+)").unwrap();
    let tag = re
        .captures(&dockerfile)
        .map(|c| c[1].to_string())
        .expect("Dockerfile has a rust builder stage");
    let locked = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../Cargo.lock")
        .exists();
    assert!(
        locked || tag == "1",
        "rust:{tag} pins an old toolchain while dependency versions float"
    );
    if locked {
        assert!(dockerfile.contains("--locked"));
    }
}

#[test]
fn compose_restarts_and_reads_env_file() {
    let compose = repo_file("docker-compose.yml");
    assert!(compose.contains("restart: unless-stopped"));
    assert!(compose.contains("env_file: .env"));
}
