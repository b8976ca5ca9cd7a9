//! Generate `api_ffi.h` from the `extern "C"` surface into `OUT_DIR`.
//!
//! Set `API_FFI_HEADER_DIR` to also copy the header somewhere a native
//! project can include it from.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");
    println!("cargo:rerun-if-env-changed=API_FFI_HEADER_DIR");

    let (Ok(crate_dir), Ok(out_dir)) = (env::var("CARGO_MANIFEST_DIR"), env::var("OUT_DIR")) else {
        println!("cargo:warning=CARGO_MANIFEST_DIR or OUT_DIR unset, skipping header");
        return;
    };
    let header = PathBuf::from(out_dir).join("api_ffi.h");

    let config = cbindgen::Config {
        language: cbindgen::Language::C,
        include_guard: Some("API_FFI_H".to_string()),
        cpp_compat: true,
        ..Default::default()
    };

    let bindings = match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => bindings,
        // A header failure must not break the library build itself.
        Err(e) => {
            println!("cargo:warning=cbindgen failed: {e}");
            return;
        }
    };
    bindings.write_to_file(&header);

    if let Ok(dir) = env::var("API_FFI_HEADER_DIR") {
        let dest = PathBuf::from(dir).join("api_ffi.h");
        if let Err(e) = std::fs::copy(&header, &dest) {
            println!("cargo:warning=could not copy header to {}: {e}", dest.display());
        }
    }
}
