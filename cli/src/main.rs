mod config;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgGroup, Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use engine::{DiagnosticKind, Diagnostics, RenderOptions, Value};
use skeleton::Document;

use crate::config::LoadError;

#[derive(Parser)]
#[command(name = "docfill", version, about = "Fill Markdown document skeletons with data")]
struct Cli {
    /// Disable colored diagnostic output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log more (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a skeleton with data
    Render(RenderArgs),

    /// Check a skeleton's markers and placeholders without data
    Validate(ValidateArgs),

    /// Run .test.md test files
    Test(TestArgs),
}

#[derive(clap::Args)]
#[command(group(ArgGroup::new("input").required(true).args(["data", "data_json"])))]
struct RenderArgs {
    /// Markdown skeleton to fill
    skeleton: PathBuf,

    /// Data file (.json or .toml)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Inline JSON data
    #[arg(long)]
    data_json: Option<String>,

    /// Write the rendered document here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML file with a [render] table of options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report type mismatches instead of coercing them
    #[arg(long)]
    strict: bool,

    /// Abort on the first fatal diagnostic
    #[arg(long)]
    fail_fast: bool,

    /// Merge adjacent same-style runs before rendering
    #[arg(long)]
    normalize_runs: bool,
}

#[derive(clap::Args)]
struct ValidateArgs {
    /// Markdown skeleton to check
    skeleton: PathBuf,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let color_choice = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    match cli.command {
        Command::Render(args) => do_render(args, color_choice),
        Command::Validate(args) => do_validate(args, color_choice),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fail(error: LoadError) -> ! {
    eprintln!("error: {}", error);
    process::exit(1);
}

/// Options from `--config`, with command-line flags switched on over them.
fn resolve_options(args: &RenderArgs) -> Result<RenderOptions, LoadError> {
    let mut options = match &args.config {
        Some(path) => config::load_config(path)?.render,
        None => RenderOptions::default(),
    };
    options.strict |= args.strict;
    options.fail_fast |= args.fail_fast;
    options.normalize_runs |= args.normalize_runs;
    tracing::debug!(?options, "resolved render options");
    Ok(options)
}

fn load_input(args: &RenderArgs) -> Result<Value, LoadError> {
    match (&args.data, &args.data_json) {
        (Some(path), _) => config::load_data(path),
        (None, Some(json)) => config::parse_json_data(json, "--data-json"),
        (None, None) => Ok(Value::default()),
    }
}

/// Read and parse a skeleton, printing parse errors. Exits on failure.
fn load_skeleton(
    path: &Path,
    writer: &StandardStream,
    config: &term::Config,
) -> (SimpleFiles<String, String>, usize, Document) {
    let source = config::read_file(path).unwrap_or_else(|e| fail(e));

    let mut files = SimpleFiles::new();
    let file_id = files.add(path.display().to_string(), source.clone());

    let parser = skeleton::parser::Parser::new(source, file_id);
    match parser.parse() {
        Ok(document) => (files, file_id, document),
        Err(errors) => {
            for error in &errors {
                let diagnostic = error.to_diagnostic();
                let _ = term::emit_to_write_style(&mut writer.lock(), config, &files, &diagnostic);
            }
            process::exit(1);
        }
    }
}

fn do_render(args: RenderArgs, color_choice: ColorChoice) {
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();

    let options = resolve_options(&args).unwrap_or_else(|e| fail(e));
    let data = load_input(&args).unwrap_or_else(|e| fail(e));
    let (files, file_id, document) = load_skeleton(&args.skeleton, &writer, &config);

    match engine::render(document, &data, &options) {
        Ok(rendered) => {
            let mut collected = Diagnostics::new(options);
            for diagnostic in rendered.diagnostics {
                collected.record(diagnostic);
            }
            emit_diagnostics(&writer, &config, &files, file_id, &collected);

            let text = rendered.document.to_string();
            match &args.output {
                Some(path) => {
                    if let Err(e) = std::fs::write(path, text) {
                        eprintln!("error: cannot write '{}': {}", path.display(), e);
                        process::exit(1);
                    }
                }
                None => print!("{}", text),
            }
        }
        Err(error) => {
            let mut collected = Diagnostics::new(options);
            for diagnostic in error.diagnostics.iter().cloned() {
                collected.record(diagnostic);
            }
            emit_diagnostics(&writer, &config, &files, file_id, &collected);
            eprintln!("error: {}", error);
            process::exit(1);
        }
    }
}

fn do_validate(args: ValidateArgs, color_choice: ColorChoice) {
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();
    let (files, file_id, document) = load_skeleton(&args.skeleton, &writer, &config);

    let mut collected = Diagnostics::new(RenderOptions::default());
    for diagnostic in engine::validate(&document) {
        collected.record(diagnostic);
    }
    emit_diagnostics(&writer, &config, &files, file_id, &collected);

    if collected.all().is_empty() {
        eprintln!("ok: {} is a valid skeleton", args.skeleton.display());
    } else {
        process::exit(1);
    }
}

fn emit_diagnostics(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    file_id: usize,
    diagnostics: &Diagnostics,
) {
    for diagnostic in diagnostics.all() {
        let report = to_report(diagnostic, file_id, diagnostics.is_fatal(diagnostic));
        let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &report);
    }
}

fn to_report(diagnostic: &engine::Diagnostic, file_id: usize, fatal: bool) -> Diagnostic<usize> {
    let severity = if fatal {
        Severity::Error
    } else if diagnostic.kind == DiagnosticKind::EmptySequence {
        Severity::Note
    } else {
        Severity::Warning
    };

    let mut report = Diagnostic::new(severity)
        .with_code(diagnostic.kind.as_str())
        .with_message(&diagnostic.message)
        .with_notes(vec![format!("at {}", diagnostic.location)]);
    if !diagnostic.span.is_empty() {
        report = report.with_labels(vec![Label::primary(file_id, diagnostic.span.clone())]);
    }
    report
}
