fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Capture the commit hash for the version metadata record written into
    // every recording. Builds outside a git checkout fall back to "unknown".
    let commit = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|hash| hash.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=DDS_RECORDER_COMMIT_HASH={}", commit);
    println!("cargo:rerun-if-changed=build.rs");

    Ok(())
}
