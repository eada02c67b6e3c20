//! Build script - hands `memory.x` to the cortex-m-rt linker script.
//!
//! The nRF52840 has 1M of flash and 256K of RAM. SoftDevice S140 7.x is
//! flashed separately and keeps flash 0x0000_0000..0x0002_7000 (156K) and
//! RAM 0x2000_0000..0x2002_0000 (128K, enough for one peripheral link with
//! a 64-byte ATT MTU). The firmware links into what is left: FLASH from
//! 0x0002_7000 (868K) and RAM from 0x2002_0000 (128K). If the SoftDevice
//! configuration in `main.rs` grows, `Softdevice::enable` logs the RAM start
//! it needs and `memory.x` must move with it.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    fs::copy("memory.x", out_dir.join("memory.x")).unwrap();
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}
