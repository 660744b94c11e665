use std::fs;
use std::path::Path;

// Exposes the workspace `VERSION` file as `CROPFORM_VERSION`.
fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("manifest dir");
    let version_path = Path::new(&manifest_dir).join("../../VERSION");
    println!("cargo:rerun-if-changed={}", version_path.display());

    let version = fs::read_to_string(&version_path)
        .unwrap_or_else(|error| panic!("read {}: {error}", version_path.display()));
    let version = version.trim();
    assert!(!version.is_empty(), "VERSION must not be empty");

    println!("cargo:rustc-env=CROPFORM_VERSION={version}");
}
