use std::env;
use std::path::PathBuf;

// ffmpeg-sys-next locates FFmpeg through FFMPEG_DIR or pkg-config. Neither is
// reliably present on Windows, so emit build-time hints pointing at a vcpkg
// install when one is detectable.
fn main() {
    for variable in [
        "FFMPEG_DIR",
        "VCPKG_ROOT",
        "VCPKGRS_DYNAMIC",
        "VCPKGRS_TRIPLET",
    ] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows")
        || env::var_os("FFMPEG_DIR").is_some()
    {
        return;
    }

    let Ok(vcpkg_root) = env::var("VCPKG_ROOT") else {
        println!(
            "cargo:warning=FFMPEG_DIR is not set. On Windows, install FFmpeg through vcpkg and export VCPKG_ROOT and FFMPEG_DIR so ffmpeg-sys-next can find it."
        );
        return;
    };

    let triplet = env::var("VCPKGRS_TRIPLET").unwrap_or_else(|_| "x64-windows".to_string());
    let install_dir = PathBuf::from(vcpkg_root).join("installed").join(triplet);

    if !install_dir.exists() {
        println!(
            "cargo:warning=VCPKG_ROOT is set but {} does not exist; no FFmpeg install found there.",
            install_dir.display(),
        );
        return;
    }

    println!(
        "cargo:warning=Found a vcpkg tree at {dir}. Set FFMPEG_DIR={dir} to make FFmpeg discovery explicit.",
        dir = install_dir.display(),
    );
    if env::var_os("VCPKGRS_DYNAMIC").is_none() {
        println!("cargo:warning=For dynamic vcpkg FFmpeg builds, also set VCPKGRS_DYNAMIC=1.");
    }
}
