use super::read_file;
use abkit_url_filter::{extract, CompiledFilter, MatchType, UrlFilter};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct MatchArgs {
    /// URL filter file (JSON)
    pub filter: PathBuf,

    /// URLs to test
    #[arg(required = true)]
    pub urls: Vec<String>,
}

pub fn match_urls(args: MatchArgs) -> Result<()> {
    let json = read_file(&args.filter)?;
    let filter: UrlFilter = serde_json::from_str(&json)
        .with_context(|| format!("Invalid URL filter {}", args.filter.display()))?;

    let compiled = match CompiledFilter::compile(&filter) {
        Ok(compiled) => compiled,
        Err(err) => {
            eprintln!("{} {}", "⚠️".yellow(), err.to_string().yellow());
            CompiledFilter::compile_lenient(&filter)
        }
    };

    for url in &args.urls {
        println!("{}", match_line(&compiled, url));
    }
    Ok(())
}

fn match_line(filter: &CompiledFilter, url: &str) -> String {
    let target = extract(filter.match_type(), url);
    let compared = if filter.match_type() == MatchType::FullUrl {
        String::new()
    } else {
        format!(" ({})", target).dimmed().to_string()
    };

    if filter.matches(url) {
        format!("{} {}{}", "✓".green(), url, compared)
    } else {
        format!("{} {}{}", "✗".red(), url, compared)
    }
}
