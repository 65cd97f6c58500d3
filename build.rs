use anyhow::{Context, Result};
use chrono::TimeZone;
use std::env;
use std::fs;
use std::process::Command;
use vergen_gitcl::{Emitter, GitclBuilder};

const LIBRARY: &str = "oggflac";

fn main() -> Result<()> {
    let gitcl = GitclBuilder::default()
        .describe(true, true, Some("[0-9]*"))
        .build()?;

    let gitcl_res = Emitter::default()
        .idempotent()
        .fail_on_error()
        .add_instructions(&gitcl)
        .and_then(|emitter| emitter.emit());

    if let Err(e) = gitcl_res {
        eprintln!("error occurred while generating instructions: {e:?}");
        Emitter::default().idempotent().fail_on_error().emit()?;
    }

    // Reproducible builds pin the timestamp
    let now = match env::var("SOURCE_DATE_EPOCH") {
        Ok(val) => {
            let secs = val.parse::<i64>().context("SOURCE_DATE_EPOCH is not an integer")?;
            chrono::Utc
                .timestamp_opt(secs, 0)
                .single()
                .context("SOURCE_DATE_EPOCH is out of range")?
        }
        Err(_) => chrono::Utc::now(),
    };

    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let version = library_version_from_metadata()
        .or_else(|_| library_version_from_manifest())
        .unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=OGGFLAC_VERSION={version}");

    println!("cargo:rerun-if-changed={LIBRARY}/Cargo.toml");

    Ok(())
}

/// Looks the library up in `cargo metadata`, as a workspace member or as a
/// resolved registry dependency.
fn library_version_from_metadata() -> Result<String> {
    let output = Command::new("cargo")
        .args(["metadata", "--format-version", "1"])
        .output()?;

    if !output.status.success() {
        anyhow::bail!("cargo metadata failed");
    }

    let metadata: serde_json::Value = serde_json::from_slice(&output.stdout)?;

    let member = metadata["packages"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|package| package["name"].as_str() == Some(LIBRARY))
        .and_then(|package| package["version"].as_str());
    if let Some(version) = member {
        return Ok(version.to_string());
    }

    // Node ids look like "oggflac 0.1.0 (registry+...)"
    let prefix = format!("{LIBRARY} ");
    let resolved = metadata["resolve"]["nodes"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|node| node["id"].as_str())
        .find_map(|id| id.strip_prefix(prefix.as_str()))
        .and_then(|rest| rest.split(' ').next());
    if let Some(version) = resolved {
        return Ok(version.to_string());
    }

    anyhow::bail!("{LIBRARY} package not found in metadata");
}

fn library_version_from_manifest() -> Result<String> {
    let toml_content = fs::read_to_string(format!("{LIBRARY}/Cargo.toml"))?;

    for line in toml_content.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("version") {
            if let Some(value) = value.trim_start().strip_prefix('=') {
                return Ok(value.trim().trim_matches('"').trim_matches('\'').to_string());
            }
        }
    }

    anyhow::bail!("Could not find version in {LIBRARY}/Cargo.toml");
}
