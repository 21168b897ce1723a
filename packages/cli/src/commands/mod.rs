pub mod apply;
pub mod init;
pub mod matching;
pub mod replay;
pub mod validate;

pub use apply::{apply, ApplyArgs};
pub use init::{init, InitArgs};
pub use matching::{match_urls, MatchArgs};
pub use replay::{replay, ReplayArgs};
pub use validate::{validate, ValidateArgs};

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))
}

/// Write `html` to `output`, or print it when no file is given
fn emit_html(html: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, html).with_context(|| format!("Cannot write {}", path.display()))
        }
        None => {
            println!("{}", html);
            Ok(())
        }
    }
}
