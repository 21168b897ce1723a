//! Scripted edit sessions: a recorded list of operator actions replayed
//! against a page, ending with the page, the cursor and the change list.

use super::{emit_html, read_file};
use crate::config::Config;
use abkit_changes::ChangeRecord;
use abkit_editor::{EditSession, EngineConfig, Owner, Page};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// HTML page to edit
    pub page: PathBuf,

    /// Replay script (JSON)
    pub script: PathBuf,

    /// Page URL (overrides the script and config)
    #[arg(short, long)]
    pub url: Option<String>,

    /// Write the resulting HTML here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Save the session's change set to this file
    #[arg(long)]
    pub changes: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayScript {
    pub experiment_id: String,
    pub variant_id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Step {
    Select { selector: String },
    Record { change: ChangeRecord },
    Commit,
    Deselect,
    Undo,
    Redo,
}

pub struct ReplayOutcome {
    pub page: Page,
    pub session: EditSession,
    pub log: Vec<String>,
}

pub fn replay(args: ReplayArgs, config: &Config) -> Result<()> {
    let html = read_file(&args.page)?;
    let script: ReplayScript = serde_json::from_str(&read_file(&args.script)?)
        .with_context(|| format!("Invalid replay script {}", args.script.display()))?;
    let url = args
        .url
        .clone()
        .or_else(|| script.url.clone())
        .unwrap_or_else(|| config.default_url.clone());

    let outcome = run_script(&html, &url, &script, &config.engine)?;

    let summary = format!(
        "{} cursor {} of {}",
        "▸".bright_blue(),
        outcome.session.cursor(),
        outcome.session.history().len()
    );
    for line in outcome.log.iter().chain(std::iter::once(&summary)) {
        if args.output.is_some() {
            println!("{}", line);
        } else {
            eprintln!("{}", line);
        }
    }

    if let Some(path) = &args.changes {
        let set = outcome.session.to_change_set()?;
        fs::write(path, set.to_json_pretty()?)
            .with_context(|| format!("Cannot write {}", path.display()))?;
    }

    emit_html(&outcome.page.to_html(), args.output.as_deref())
}

pub fn run_script(
    html: &str,
    url: &str,
    script: &ReplayScript,
    engine: &EngineConfig,
) -> Result<ReplayOutcome> {
    let mut page = Page::parse(html, url, engine).context("Cannot parse page")?;
    let owner = Owner::new(&script.experiment_id, &script.variant_id)
        .context("Invalid experiment or variant id")?;
    let mut session = EditSession::new("replay", owner, engine)?;
    let mut log = Vec::new();

    for (index, step) in script.steps.iter().enumerate() {
        let number = index + 1;
        let done = match step {
            Step::Select { selector } => {
                session.select(selector.clone());
                format!("select {}", selector)
            }
            Step::Record { change } => {
                session
                    .record(change.clone(), &mut page)
                    .with_context(|| format!("Step {} failed: {} on '{}'", number, change.change_type(), change.selector()))?;
                format!("record {} {}", change.change_type(), change.selector())
            }
            Step::Commit => {
                session.commit();
                "commit".to_string()
            }
            Step::Deselect => {
                session.deselect();
                "deselect".to_string()
            }
            Step::Undo => {
                if session.undo(&mut page) {
                    "undo".to_string()
                } else {
                    format!("undo {}", "(nothing to undo)".dimmed())
                }
            }
            Step::Redo => {
                if session.redo(&mut page)? {
                    "redo".to_string()
                } else {
                    format!("redo {}", "(nothing to redo)".dimmed())
                }
            }
        };
        log.push(format!(
            "  {:>3}. {} {}",
            number,
            done,
            format!("[{}/{}]", session.cursor(), session.history().len()).dimmed()
        ));
    }

    Ok(ReplayOutcome { page, session, log })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><h1 id="title">Sale</h1><a id="cta">Buy</a></body></html>"#;

    fn script(steps: &str) -> ReplayScript {
        serde_json::from_str(&format!(
            r#"{{ "experimentId": "e", "variantId": "b", "steps": {} }}"#,
            steps
        ))
        .unwrap()
    }

    #[test]
    fn test_typing_squashes_then_undo_redo() {
        let script = script(
            r##"[
                { "action": "select", "selector": "#title" },
                { "action": "record", "change": { "selector": "#title", "type": "text", "value": "H" } },
                { "action": "record", "change": { "selector": "#title", "type": "text", "value": "Hi" } },
                { "action": "deselect" },
                { "action": "record", "change": { "selector": "#cta", "type": "class", "value": { "add": ["big"] } } },
                { "action": "undo" },
                { "action": "redo" },
                { "action": "redo" }
            ]"##,
        );
        let outcome = run_script(PAGE, "https://shop.test/", &script, &EngineConfig::default()).unwrap();

        assert_eq!(outcome.session.history().len(), 2);
        assert_eq!(outcome.session.cursor(), 2);
        assert_eq!(outcome.log.len(), 8);
        assert!(outcome.log[7].contains("nothing to redo"));

        let doc = outcome.page.document();
        let title = doc.get_element_by_id("title").unwrap();
        assert_eq!(doc.text_content(title), "Hi");

        let set = outcome.session.to_change_set().unwrap();
        assert_eq!(set.changes.len(), 2);
    }

    #[test]
    fn test_invalid_step_stops_replay() {
        let script = script(
            r##"[
                { "action": "record", "change": { "selector": "#title", "type": "move",
                  "value": { "targetSelector": "#title", "position": "firstChild" } } }
            ]"##,
        );
        let err = run_script(PAGE, "https://shop.test/", &script, &EngineConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("Step 1"));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let parsed: Result<ReplayScript, _> = serde_json::from_str(
            r#"{ "experimentId": "e", "variantId": "b", "steps": [{ "action": "rewind" }] }"#,
        );
        assert!(parsed.is_err());
    }
}
