mod config;
mod test_runner;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use log::{LevelFilter, debug, info};

use shapescript::Program;

use crate::config::Config;

const SUBCOMMANDS: &[&str] = &["parse", "test", "help"];

#[derive(Parser)]
#[command(name = "shs", version, about = "Shapescript structural parser")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (defaults to ./shapescript.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a shapescript file and report diagnostics
    Parse(ParseArgs),

    /// Run .test.shs fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct ParseArgs {
    /// Source file to parse
    file: String,

    /// Print the classified block tree with variables and calls
    #[arg(long)]
    tree: bool,

    /// Print each block's variables with their declaring line
    #[arg(long)]
    scopes: bool,

    /// Dump the parsed program with Debug formatting
    #[arg(long)]
    ast: bool,

    /// Only render fatal errors; the exit code still reflects warnings
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.shs file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `shs file.shs` is shorthand for `shs parse file.shs`.
    let mut args: Vec<String> = std::env::args().collect();
    let first_pos = args
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, a)| !a.starts_with('-'))
        .map(|(i, a)| (i, a.clone()));
    if let Some((pos, first)) = first_pos
        && !SUBCOMMANDS.contains(&first.as_str())
    {
        args.insert(pos, "parse".to_string());
    }

    let cli = Cli::parse_from(&args);
    init_logging(cli.verbose);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    };

    match cli.command {
        Command::Parse(parse_args) => {
            let code = do_parse(parse_args, &config, cli.no_color);
            process::exit(code);
        }
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
    let level = match verbose {
        0 => LevelFilter::Error,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn do_parse(args: ParseArgs, config: &Config, no_color: bool) -> i32 {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let writer = StandardStream::stderr(color_choice);
    let term_config = term::Config::default();

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            return 1;
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());

    let parser = shapescript::parser::Parser::new(source.clone(), file_id);
    let program = match parser.parse() {
        Ok(p) => p,
        Err(error) => {
            let diagnostic = error.to_diagnostic();
            let _ = term::emit_to_write_style(&mut writer.lock(), &term_config, &files, &diagnostic);
            return 1;
        }
    };

    if !program.has_warnings() {
        debug!("{}: no diagnostics", args.file);
    }
    let reported: Vec<_> = program
        .diagnostics
        .iter()
        .filter(|d| config.reports(d))
        .collect();
    debug!(
        "{} diagnostics, {} after allow list",
        program.diagnostics.len(),
        reported.len()
    );

    if !args.quiet {
        for diagnostic in &reported {
            let _ = term::emit_to_write_style(
                &mut writer.lock(),
                &term_config,
                &files,
                &diagnostic.to_diagnostic(),
            );
        }
    }

    if args.ast {
        println!("{:#?}", program);
    }
    if args.tree {
        print!("{}", program.tree.outline(&source));
    }
    if args.scopes {
        print_scopes(&program);
    }

    info!(
        "{}: {} blocks, {} lines",
        args.file,
        program.tree.len(),
        program.lines.len()
    );

    if config.diagnostics.deny_warnings && !reported.is_empty() {
        if !args.quiet {
            eprintln!(
                "error: {} warning(s) with deny_warnings set",
                reported.len()
            );
        }
        return 1;
    }
    0
}

/// One section per block that declares anything: `Kind (lines a-b)`, then
/// `name : Type = binding  (line n)` per variable.
fn print_scopes(program: &Program) {
    let line_of = |offset: usize| {
        let index = shapescript::line::line_at(&program.lines, offset);
        program.lines[index].number()
    };
    for block in program.tree.iter() {
        if block.scope.is_empty() {
            continue;
        }
        let indent = "  ".repeat(program.tree.depth(block.id));
        println!(
            "{}{} (lines {}-{})",
            indent,
            block.kind,
            block.lines.start + 1,
            block.lines.end
        );
        for var in block.scope.iter() {
            println!("{}  {}  (line {})", indent, var, line_of(var.span.start));
        }
    }
}
