use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    let Some(manifest_dir) = env::var_os("CARGO_MANIFEST_DIR").map(PathBuf::from) else {
        return;
    };

    // Generate C header from Rust exports for the loader and networking layer
    let output_path = manifest_dir.join("include/coopbridge.h");

    let config = cbindgen::Config::from_file(manifest_dir.join("cbindgen.toml")).unwrap_or_default();

    match cbindgen::Builder::new()
        .with_crate(&manifest_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(&output_path);
        }
        Err(e) => println!("cargo:warning=Header generation skipped: {}", e),
    }
}
