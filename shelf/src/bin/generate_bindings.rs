//! Generate UniFFI Swift bindings for the Shelf app
//!
//! Run: cargo run --bin generate-bindings [-- --host-only]
//!
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │ Inputs:                                                                 │
//! │   target/release/libshelf.dylib        ← built library for bindgen     │
//! │                                                                         │
//! │ Outputs (relative to the app project root):                             │
//! │   Sources/ShelfCore/shelfFFI.h         ← C header                      │
//! │   Sources/ShelfCore/module.modulemap   ← Clang module map              │
//! │   Sources/ShelfCore/libshelf.a         ← universal static lib          │
//! │   Sources/ShelfCoreWrapper/shelf.swift ← Swift bindings                │
//! └─────────────────────────────────────────────────────────────────────────┘

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const FFI_MODULE: &str = "ShelfCoreFFI";
const TARGETS: [&str; 2] = ["aarch64-apple-darwin", "x86_64-apple-darwin"];

#[derive(Parser, Debug)]
#[command(about = "Regenerate the Swift bindings and static library")]
struct Args {
    /// App project root (defaults to the crate's parent directory)
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Only build for the host architecture instead of a universal library
    #[arg(long)]
    host_only: bool,

    /// Deployment target passed to the Rust build
    #[arg(long, default_value = "15.0")]
    macos_deployment_target: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let crate_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let project_root = match args.project_root {
        Some(root) => root,
        None => crate_dir
            .parent()
            .context("crate directory has no parent")?
            .to_path_buf(),
    };
    let ffi_dest = project_root.join("Sources/ShelfCore");
    let wrapper_dest = project_root.join("Sources/ShelfCoreWrapper");
    let generated = crate_dir.join("generated");
    let envs = [("MACOSX_DEPLOYMENT_TARGET", args.macos_deployment_target.as_str())];

    println!("Building Rust library...");
    run_cmd("cargo", &["build", "--release"], &crate_dir, &envs)?;

    println!("Generating Swift bindings...");
    run_cmd(
        "cargo",
        &[
            "run",
            "--bin",
            "uniffi-bindgen",
            "generate",
            "--library",
            "target/release/libshelf.dylib",
            "--language",
            "swift",
            "--out-dir",
            "generated",
        ],
        &crate_dir,
        &envs,
    )?;

    fs::create_dir_all(&ffi_dest).with_context(|| format!("creating {}", ffi_dest.display()))?;
    fs::create_dir_all(&wrapper_dest).with_context(|| format!("creating {}", wrapper_dest.display()))?;

    let swift = fs::read_to_string(generated.join("shelf.swift")).context("reading generated shelf.swift")?;
    fs::write(wrapper_dest.join("shelf.swift"), patch_swift(&swift)).context("writing shelf.swift")?;
    fs::copy(generated.join("shelfFFI.h"), ffi_dest.join("shelfFFI.h")).context("copying shelfFFI.h")?;
    fs::write(
        ffi_dest.join("module.modulemap"),
        format!("module {} {{\n    header \"shelfFFI.h\"\n    export *\n}}\n", FFI_MODULE),
    )
    .context("writing module.modulemap")?;

    let static_lib = ffi_dest.join("libshelf.a");
    if args.host_only {
        fs::copy(crate_dir.join("target/release/libshelf.a"), &static_lib).context("copying libshelf.a")?;
    } else {
        println!("Building universal static library...");
        let mut slices = Vec::new();
        for target in TARGETS {
            run_cmd("cargo", &["build", "--release", "--target", target], &crate_dir, &envs)?;
            slices.push(format!("target/{}/release/libshelf.a", target));
        }
        let output = static_lib.to_string_lossy().into_owned();
        let mut lipo_args: Vec<&str> = vec!["-create"];
        lipo_args.extend(slices.iter().map(String::as_str));
        lipo_args.extend(["-output", output.as_str()]);
        run_cmd("lipo", &lipo_args, &crate_dir, &[])?;
    }

    println!("Done. Wrote:");
    for path in [
        wrapper_dest.join("shelf.swift"),
        ffi_dest.join("shelfFFI.h"),
        ffi_dest.join("module.modulemap"),
        static_lib,
    ] {
        println!("  - {}", path.display());
    }
    Ok(())
}

/// Swift 6 strict concurrency and the renamed FFI module
fn patch_swift(source: &str) -> String {
    source
        .replace(
            "private var initializationResult",
            "nonisolated(unsafe) private var initializationResult",
        )
        .replace("#if canImport(shelfFFI)", &format!("#if canImport({})", FFI_MODULE))
        .replace("import shelfFFI", &format!("import {}", FFI_MODULE))
}

fn run_cmd(program: &str, args: &[&str], dir: &Path, envs: &[(&str, &str)]) -> Result<()> {
    let status = Command::new(program)
        .args(args)
        .envs(envs.iter().copied())
        .current_dir(dir)
        .status()
        .with_context(|| format!("failed to run {}", program))?;
    if !status.success() {
        bail!("{} {} failed with {}", program, args.join(" "), status);
    }
    Ok(())
}
