// build.rs

//! Stamps the version `rosapi --version` reports. Release builds set
//! `ROSAPI_VERSION`; everything else reports the package version.

use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=ROSAPI_VERSION");

    let version = match env::var("ROSAPI_VERSION") {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "dev".to_string()),
    };
    println!("cargo:rustc-env=ROSAPI_BUILD_VERSION={version}");
}
