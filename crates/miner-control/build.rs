use std::env;
use std::fs;

fn main() {
    // Re-run when the git state changes so the long version stays honest.
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs");
    println!("cargo:rerun-if-env-changed=CARGO_PKG_VERSION");

    let pkg_version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    let version = match short_git_sha() {
        Some(sha) => format!("{pkg_version}+{sha}"),
        None => pkg_version,
    };
    println!("cargo:rustc-env=EMBER_BUILD_VERSION={version}");
}

/// First 8 hex chars of HEAD, resolved without the `git` binary.
fn short_git_sha() -> Option<String> {
    let mut dir = env::current_dir().ok()?;
    loop {
        let head_path = dir.join(".git").join("HEAD");
        if head_path.is_file() {
            let head = fs::read_to_string(&head_path).ok()?;
            let head = head.trim();
            let sha = match head.strip_prefix("ref: ") {
                Some(reference) => {
                    let loose = dir.join(".git").join(reference.trim());
                    fs::read_to_string(loose).ok()?.trim().to_string()
                }
                None => head.to_string(),
            };
            return sha.get(0..8).map(|s| s.to_string());
        }
        if !dir.pop() {
            return None;
        }
    }
}
