use super::{emit_html, read_file};
use crate::config::Config;
use abkit_changes::VariantChangeSet;
use abkit_editor::{EngineConfig, Page};
use abkit_preview::{NavigationWatcher, PreviewController, RecordStatus, Transition};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// HTML page to change
    pub page: PathBuf,

    /// Variant change set files (JSON)
    #[arg(required = true)]
    pub variants: Vec<PathBuf>,

    /// URL the page is served from, checked against each variant's filter
    #[arg(short, long)]
    pub url: Option<String>,

    /// Write the resulting HTML here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn apply(args: ApplyArgs, config: &Config) -> Result<()> {
    let html = read_file(&args.page)?;
    let sets = args
        .variants
        .iter()
        .map(|path| load_variant(path))
        .collect::<Result<Vec<_>>>()?;
    let url = args.url.as_deref().unwrap_or(&config.default_url);

    let (page, transitions) = apply_variants(&html, url, &sets, &config.engine)?;

    // Keep stdout clean for the HTML when it goes there
    let lines = report_lines(&sets, &transitions);
    for line in &lines {
        if args.output.is_some() {
            println!("{}", line);
        } else {
            eprintln!("{}", line);
        }
    }

    emit_html(&page.to_html(), args.output.as_deref())
}

pub(crate) fn load_variant(path: &Path) -> Result<VariantChangeSet> {
    let json = read_file(path)?;
    VariantChangeSet::from_json(&json)
        .with_context(|| format!("Invalid variant file {}", path.display()))
}

/// Load the page at `url` and bring every variant in scope onto it
pub(crate) fn apply_variants(
    html: &str,
    url: &str,
    sets: &[VariantChangeSet],
    engine: &EngineConfig,
) -> Result<(Page, Vec<Transition>)> {
    let mut page = Page::parse(html, url, engine).context("Cannot parse page")?;
    let mut controller = PreviewController::new();
    for set in sets {
        controller.activate(set, &mut page).with_context(|| {
            format!("Invalid variant {}/{}", set.experiment_id, set.variant_id)
        })?;
    }

    let transitions = NavigationWatcher::new().sync(&mut controller, &mut page);
    Ok((page, transitions))
}

pub(crate) fn report_lines(sets: &[VariantChangeSet], transitions: &[Transition]) -> Vec<String> {
    let mut lines = Vec::new();
    for set in sets {
        let name = format!("{}/{}", set.experiment_id, set.variant_id);
        let Some(transition) = transitions.iter().find(|t| {
            t.owner.experiment_id == set.experiment_id && t.owner.variant_id == set.variant_id
        }) else {
            lines.push(format!(
                "{} {} {}",
                "○".dimmed(),
                name.bright_white(),
                "skipped: URL not in scope".dimmed()
            ));
            continue;
        };

        lines.push(format!("{} {}", "▸".bright_blue(), name.bright_white().bold()));
        for record in &transition.report.records {
            let id = record.record_id.as_str();
            let line = match &record.status {
                RecordStatus::Applied(outcome) if outcome.applied_count == 0 && outcome.skipped_count == 0 => {
                    format!("  {} {} {}", "·".yellow(), id, "matched nothing".yellow())
                }
                RecordStatus::Applied(outcome) => format!(
                    "  {} {} applied to {} element(s)",
                    "✓".green(),
                    id,
                    outcome.applied_count
                ),
                RecordStatus::Pending => {
                    format!("  {} {} {}", "…".yellow(), id, "waiting for element".yellow())
                }
                RecordStatus::Disabled => format!("  {} {}", "-".dimmed(), format!("{} disabled", id).dimmed()),
                RecordStatus::Failed(err) => format!("  {} {} {}", "✗".red(), id, err.to_string().red()),
                RecordStatus::Reverted(_) | RecordStatus::NotPresent => continue,
            };
            lines.push(line);
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><h1 id="title">Sale</h1></body></html>"#;

    fn variant(json: &str) -> VariantChangeSet {
        VariantChangeSet::from_json(json).unwrap()
    }

    #[test]
    fn test_variant_in_scope_is_applied() {
        let set = variant(
            r##"{ "experimentId": "e", "variantId": "b",
                 "urlFilter": { "include": ["/sale*"] },
                 "changes": [{ "id": "t", "selector": "#title", "type": "text", "value": "Deal" }] }"##,
        );
        let (page, transitions) =
            apply_variants(PAGE, "https://shop.test/sale", &[set.clone()], &EngineConfig::default())
                .unwrap();

        assert_eq!(transitions.len(), 1);
        assert!(page.to_html().contains(r#"data-abkit-change="e/b/t""#));
        let lines = report_lines(&[set], &transitions);
        assert!(lines.iter().any(|l| l.contains("applied to 1")));
    }

    #[test]
    fn test_variant_out_of_scope_is_skipped() {
        let set = variant(
            r##"{ "experimentId": "e", "variantId": "b",
                 "urlFilter": { "include": ["/sale*"] },
                 "changes": [{ "id": "t", "selector": "#title", "type": "text", "value": "Deal" }] }"##,
        );
        let (page, transitions) =
            apply_variants(PAGE, "https://shop.test/home", &[set.clone()], &EngineConfig::default())
                .unwrap();

        assert!(transitions.is_empty());
        assert!(!page.to_html().contains("data-abkit"));
        let lines = report_lines(&[set], &transitions);
        assert!(lines[0].contains("not in scope"));
    }

    #[test]
    fn test_failed_record_reported_alongside_applied() {
        let set = variant(
            r##"{ "experimentId": "e", "variantId": "b", "changes": [
                 { "id": "bad", "selector": "#title", "type": "attribute", "value": { "data-abkit-key": "x" } },
                 { "id": "ok", "selector": "#title", "type": "text", "value": "Deal" } ] }"##,
        );
        let (_, transitions) =
            apply_variants(PAGE, "https://shop.test/", &[set.clone()], &EngineConfig::default())
                .unwrap();

        let lines = report_lines(&[set], &transitions);
        assert!(lines.iter().any(|l| l.contains("bad") && l.contains("reserved")));
        assert!(lines.iter().any(|l| l.contains("ok") && l.contains("applied to 1")));
    }
}
