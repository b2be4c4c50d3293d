// Command-line harness for the mathmark editor core.
//
// Usage:
//  mathmark export <input> [-o <file>]   - Re-export Markdown through the codec
//  mathmark stats <input>                - Print document counters as JSON
//  mathmark type <input>                 - Replay input keystroke by keystroke, print the result
//  mathmark preview <input> [-o <file>]  - Render an HTML preview
//  mathmark guard <input>                - Classify the text with the keyword classifier
//
// `<input>` may be `-` for stdin. `--config <file>` takes an editor config as
// JSON; a malformed file falls back to the defaults.

use clap::{Parser, Subcommand};
use mathmark_core::{
    EditorConfig, EditorError, GuardStatus, KeywordClassifier, MarkdownEditor, Verdict,
};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "mathmark", version, about = "Markdown with live math, from the terminal")]
struct Cli {
    /// Editor config as JSON
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import Markdown and export it again in normalised form
    Export {
        /// Markdown file, or `-` for stdin
        input: String,
        /// Write here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print character, formula and block counts as JSON
    Stats {
        /// Markdown file, or `-` for stdin
        input: String,
    },
    /// Type the input into an empty editor one keystroke at a time
    Type {
        /// Text file, or `-` for stdin
        input: String,
    },
    /// Render the document as HTML
    Preview {
        /// Markdown file, or `-` for stdin
        input: String,
        /// Write here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Classify the document text and print the verdict as JSON
    Guard {
        /// Markdown file, or `-` for stdin
        input: String,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("could not read '{path}': {source}")]
    Read { path: String, source: io::Error },
    #[error("could not write '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error("the content guard is disabled by the config")]
    GuardDisabled,
    #[error("could not encode output: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => EditorConfig::from_json(&read_input(&path.to_string_lossy())?),
        None => EditorConfig::default(),
    };
    let editor = MarkdownEditor::new(config);

    match cli.command {
        Command::Export { input, output } => {
            load(&editor, &input)?;
            emit(&editor.to_markdown()?, output.as_deref())
        }
        Command::Stats { input } => {
            load(&editor, &input)?;
            println!("{}", serde_json::to_string_pretty(&editor.stats())?);
            Ok(())
        }
        Command::Type { input } => {
            let text = read_input(&input)?;
            editor.type_text(text.trim_end_matches('\n'))?;
            emit(&editor.to_markdown()?, None)
        }
        Command::Preview { input, output } => {
            load(&editor, &input)?;
            emit(&editor.preview_html(), output.as_deref())
        }
        Command::Guard { input } => {
            if !editor.config().content_guard {
                return Err(CliError::GuardDisabled);
            }
            load(&editor, &input)?;
            if let Some(deadline) = editor.guard_deadline() {
                editor.run_guard(deadline, &KeywordClassifier::default());
            }
            let verdict = match editor.guard_status() {
                Some(GuardStatus::Warning(categories)) => Verdict::from_categories(categories),
                _ => Verdict::safe(),
            };
            println!("{}", serde_json::to_string(&verdict)?);
            Ok(())
        }
    }
}

fn read_input(input: &str) -> Result<String, CliError> {
    let result = if input == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).map(|_| buffer)
    } else {
        fs::read_to_string(input)
    };
    result.map_err(|source| CliError::Read {
        path: input.to_string(),
        source,
    })
}

fn load(editor: &MarkdownEditor, input: &str) -> Result<(), CliError> {
    let source = read_input(input)?;
    let diagnostics = editor.load_markdown(&source)?;
    for warning in &diagnostics.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

fn emit(text: &str, output: Option<&Path>) -> Result<(), CliError> {
    match output {
        Some(path) => fs::write(path, text).map_err(|source| CliError::Write {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}
