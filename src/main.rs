//! # cherri
//!
//! Compiles a `.cherri` source file into a Shortcuts package and signs it
//! with the `shortcuts` tool.
//!
//! ## Usage
//!
//! - Compile and sign: `cherri main.cherri`
//! - Share with anyone: `cherri main.cherri --share anyone`
//! - Skip signing: `cherri main.cherri --unsigned`
//! - Keep the plist and dump tokens: `cherri main.cherri --debug`

/// Entry point for the CLI tool.
fn main() {
    std::process::exit(cherri::cli::run_cli());
}
