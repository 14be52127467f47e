//! Interactive initialization for letterloop.
//!
//! Writes the key file, a starter `letterloop.toml` and an empty rules
//! document into the working directory.

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{Input, Password, Select};
use std::fs;
use std::path::Path;

use crate::config::{CONFIG_FILE_NAME, DEFAULT_KEY_FILE, DEFAULT_RULES_FILE};

const MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-pro", "Other..."];

pub fn handle_init(working_dir: &Path) -> Result<()> {
    eprintln!("{}", "Setting up letterloop...".bold());
    eprintln!();

    // Step 1: credentials
    let api_key: String = Password::new()
        .with_prompt("Gemini API key")
        .interact()?;

    let selection = Select::new()
        .with_prompt("Select the model for drafting and grading")
        .items(MODELS)
        .default(0)
        .interact()?;
    let model = if selection == MODELS.len() - 1 {
        Input::<String>::new()
            .with_prompt("Model name")
            .interact_text()?
    } else {
        MODELS[selection].to_string()
    };

    write_if_confirmed(
        &working_dir.join(DEFAULT_KEY_FILE),
        &format!("{},{}\n", api_key.trim(), model.trim()),
    )?;

    // Step 2: project config
    write_if_confirmed(&working_dir.join(CONFIG_FILE_NAME), &starter_config())?;

    // Step 3: rules document
    let rules_path = working_dir.join(DEFAULT_RULES_FILE);
    if !rules_path.exists() {
        fs::write(
            &rules_path,
            "Maintain a professional business tone.\nKeep the letter to one page.\n",
        )
        .with_context(|| format!("Failed to write {}", rules_path.display()))?;
        eprintln!("{} Wrote {}", "✓".bright_green(), rules_path.display());
    }

    print_getting_started();
    Ok(())
}

fn write_if_confirmed(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        eprintln!(
            "{} {} already exists",
            "⚠".bright_yellow(),
            path.display()
        );

        let overwrite = Select::new()
            .with_prompt("Overwrite it?")
            .items(&["No, keep existing", "Yes, replace it"])
            .default(0)
            .interact()?;

        if overwrite == 0 {
            eprintln!("  Keeping {}", path.display().to_string().dimmed());
            return Ok(());
        }
    }

    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    eprintln!("{} Wrote {}", "✓".bright_green(), path.display());
    Ok(())
}

fn starter_config() -> String {
    r#"# letterloop configuration

[api]
# model = "gemini-2.5-flash"   # overrides the key file
# lite_model = "gemini-2.5-flash-lite"
# max_attempts = 5
# backoff_base = "1s"
# request_timeout = "120s"

[loop]
threshold = 90
# max_attempts = 10            # default: no limit
# stall_limit = 3              # stop when the score stops improving
# total_strategy = "model"     # or "local"

[rubric]
criteria = 20
weight = 5

[paths]
rules = "Rules.txt"
key_file = "API_KEY.txt"
# database = "letterloop.db"
# log_file = "letterloop.log"
# event_log = "letterloop-events.jsonl"
"#
    .to_string()
}

/// Print the getting started guide
pub fn print_getting_started() {
    eprintln!();
    eprintln!("{}", "Getting started:".bold());
    eprintln!(
        "  {} Save the job posting, resume and portfolio as text files",
        "1.".dimmed()
    );
    eprintln!(
        "  {} Run: {}",
        "2.".dimmed(),
        "letterloop analyze --job-posting job.txt --resume resume.txt".bright_cyan()
    );
    eprintln!(
        "  {} Run: {}",
        "3.".dimmed(),
        "letterloop write --output letter.txt".bright_cyan()
    );
    eprintln!(
        "  {} Inspect drafts: {}",
        "4.".dimmed(),
        "letterloop artifacts list draft".bright_cyan()
    );
}
