//! Build script for the `apprunner` manual pages.
//!
//! Renders `apprunner.1` plus one page per subcommand (`apprunner-run.1`
//! and so on) into the build output directory using clap-mangen.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Command, CommandFactory};
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn render(command: Command, out_dir: &Path, file_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut buffer = Vec::new();
    Man::new(command).render(&mut buffer)?;
    fs::write(out_dir.join(file_name), buffer)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    let root = Cli::command();
    for sub in root.get_subcommands() {
        let file_name = format!("apprunner-{}.1", sub.get_name());
        render(sub.clone(), &out_dir, &file_name)?;
    }
    render(root, &out_dir, "apprunner.1")?;

    Ok(())
}
