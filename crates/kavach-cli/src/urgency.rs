//! `kavach urgency`: one-shot urgency prediction for a line typed on stdin.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use kavach_ai::urgency::{DEFAULT_MODEL_PATH, DEFAULT_VECTORIZER_PATH, UrgencyClassifier};

const PROMPT: &str = "Enter crime additional information: ";

#[derive(Args, Debug)]
pub struct UrgencyArgs {
    /// Fitted linear classifier (JSON)
    #[arg(long, env = "KAVACH_URGENCY_MODEL", default_value = DEFAULT_MODEL_PATH)]
    pub model: PathBuf,

    /// Fitted TF-IDF vectorizer (JSON)
    #[arg(long, env = "KAVACH_URGENCY_VECTORIZER", default_value = DEFAULT_VECTORIZER_PATH)]
    pub vectorizer: PathBuf,
}

pub fn run(args: &UrgencyArgs) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    predict_interactive(args, stdin.lock(), stdout.lock())
}

fn predict_interactive(
    args: &UrgencyArgs,
    mut input: impl BufRead,
    mut output: impl Write,
) -> anyhow::Result<()> {
    let classifier = UrgencyClassifier::load(&args.model, &args.vectorizer)
        .context("loading urgency artifacts")?;
    tracing::debug!(classes = ?classifier.classes(), "loaded urgency classifier");

    write!(output, "{PROMPT}")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line).context("reading stdin")?;

    let label = classifier.predict(&line);
    writeln!(output, "\nPredicted Urgency Category: {label}")?;
    Ok(())
}
