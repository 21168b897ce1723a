use crate::config::{Config, DEFAULT_CONFIG_NAME};
use abkit_changes::{ChangeRecord, Position, UrlFilter, VariantChangeSet};
use abkit_editor::EngineConfig;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::Path;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Prefix for the marker attributes written on changed elements
    #[arg(short, long, default_value = abkit_editor::DEFAULT_MARKER_PREFIX)]
    pub marker_prefix: String,

    /// Directory for variant change sets
    #[arg(long, default_value = "variants")]
    pub variants_dir: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, dir: &Path) -> Result<()> {
    let config_path = Config::path(dir);

    // Check if config already exists
    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    let config = Config {
        engine: EngineConfig::default().with_marker_prefix(&args.marker_prefix),
        ..Config::default()
    };
    config.engine.validate()?;

    println!("{}", "📝 Initializing abkit project...".bright_blue().bold());

    let variants_dir = dir.join(&args.variants_dir);
    if !variants_dir.exists() {
        fs::create_dir_all(&variants_dir)?;
        println!("  {} Created {}/", "✓".green(), args.variants_dir);
    }

    let example_file = variants_dir.join("example.json");
    if !example_file.exists() {
        fs::write(&example_file, example_variant()?.to_json_pretty()?)?;
        println!("  {} Created {}/example.json", "✓".green(), args.variants_dir);
    }

    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    println!();
    println!("{}", "✅ Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Edit {}/example.json", args.variants_dir);
    println!("  2. Run: abkit validate {}/example.json", args.variants_dir);
    println!(
        "  3. Run: abkit apply page.html {}/example.json --url https://localhost/products/1",
        args.variants_dir
    );

    Ok(())
}

fn example_variant() -> Result<VariantChangeSet> {
    Ok(VariantChangeSet::new("example", "b")?
        .with_change(ChangeRecord::text("h1", "Hello from variant B")?)
        .with_change(ChangeRecord::style("button", [("background", "#2e7d32")])?)
        .with_change(ChangeRecord::insert(
            "h1",
            "<p class=\"promo\">Free shipping today</p>",
            Position::After,
        )?)
        .with_url_filter(UrlFilter::include(["/products/*"])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_variant_is_valid_json_payload() {
        let json = example_variant().unwrap().to_json_pretty().unwrap();
        assert!(VariantChangeSet::validate_json(&json).is_empty());
    }
}
