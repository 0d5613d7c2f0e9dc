use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::Command;

fn rustc_version() -> Option<String> {
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".into());
    let output = Command::new(rustc).arg("--version").output().ok()?;
    let stdout = String::from_utf8(output.stdout).ok()?;
    // "rustc 1.81.0 (eeb90cda1 2024-09-04)"
    stdout.split_whitespace().nth(1).map(str::to_owned)
}

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("constants.gen.rs");
    let mut f = File::create(dest_path).unwrap();

    let target = env::var("TARGET").unwrap();
    let mut target_bits = target.split('-');
    let arch = target_bits.next().unwrap_or("unknown");
    target_bits.next();
    let platform = target_bits.next().unwrap_or("unknown");

    writeln!(f, "/// The rustc version that was used to compile this crate").ok();
    match rustc_version() {
        Some(version) => writeln!(
            f,
            "#[allow(dead_code)] pub const RUSTC_VERSION: Option<&str> = Some(\"{}\");",
            version
        ),
        None => writeln!(
            f,
            "#[allow(dead_code)] pub const RUSTC_VERSION: Option<&str> = None;"
        ),
    }
    .ok();

    writeln!(f, "/// The platform identifier").ok();
    writeln!(
        f,
        "#[allow(dead_code)] pub const PLATFORM: &str = \"{}\";",
        platform
    )
    .ok();
    writeln!(f, "/// The CPU architecture identifier").ok();
    writeln!(f, "#[allow(dead_code)] pub const ARCH: &str = \"{}\";", arch).ok();
    println!("cargo:rerun-if-changed=build.rs");
}
