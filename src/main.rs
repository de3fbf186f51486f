use std::io::{self, Read, Write};
use std::process::ExitCode;

use clap::Parser as ClapParser;
use log::{error, LevelFilter};

use peggen::ast::GrammarTree;
use peggen::error::PegError;
use peggen::{check_grammar, codegen::Codegen, parse_grammar};

/// Compiles a PEG grammar read from stdin into a recursive-descent
/// Rust parser written to stdout.
#[derive(ClapParser, Debug)]
#[command(name = "peggen", about = "A PEG grammar to recursive-descent Rust parser compiler")]
struct Cli {
    /// Raise logging verbosity (repeatable: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Run the scanner/parser/checker only and skip code generation.
    #[arg(long)]
    check: bool,

    /// Pretty-print the parsed grammar's AST to stderr before generating.
    #[arg(long)]
    print_tree: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();

    let mut src = String::new();
    if let Err(err) = io::stdin().read_to_string(&mut src) {
        error!("failed to read stdin: {err}");
        return ExitCode::FAILURE;
    }

    match run(&src, cli.check, cli.print_tree) {
        Ok(generated) => {
            if !generated.is_empty() {
                print!("{generated}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(src: &str, check_only: bool, print_tree: bool) -> Result<String, PegError> {
    let grammar = parse_grammar(src)?;

    if print_tree {
        let tree = GrammarTree::new(&grammar);
        let mut stderr = io::stderr();
        let _ = ptree::write_tree(&tree, &mut stderr);
    }

    check_grammar(&grammar)?;

    if check_only {
        return Ok(String::new());
    }

    Codegen::new().generate(&grammar).map_err(PegError::from)
}

fn report(err: &PegError) {
    match err {
        PegError::Check(errors) => {
            for e in errors {
                error!("{e}");
            }
        }
        other => error!("{other}"),
    }
    let _ = io::stderr().flush();
}
