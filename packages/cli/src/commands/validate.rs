use super::read_file;
use abkit_changes::VariantChangeSet;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Variant change set files (JSON)
    #[arg(required = true)]
    pub variants: Vec<PathBuf>,
}

pub fn validate(args: ValidateArgs) -> Result<()> {
    let mut invalid_files = 0;

    for path in &args.variants {
        let json = read_file(path)?;
        let errors = VariantChangeSet::validate_json(&json);

        if errors.is_empty() {
            let count = VariantChangeSet::from_json(&json)
                .map(|set| set.changes.len())
                .unwrap_or_default();
            println!("  {} {} ({} changes)", "✓".green(), path.display(), count);
            continue;
        }

        invalid_files += 1;
        println!("  {} {}", "✗".red(), path.display());
        for error in errors {
            println!("      {}", error.to_string().red());
        }
    }

    println!();
    if invalid_files == 0 {
        println!("{} All change sets are valid", "✅".green());
        Ok(())
    } else {
        Err(anyhow!("{} of {} files failed validation", invalid_files, args.variants.len()))
    }
}
