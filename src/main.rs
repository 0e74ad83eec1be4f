use clap::{ArgAction, Parser as ClapParser, Subcommand};
use log::LevelFilter;
use rhythmix::cli::{self, CheckOptions, CheckResult, CliError};
use std::io::{self, Read};

#[derive(ClapParser)]
#[command(name = "rhythmix")]
#[command(about = "Rhythmix - A rule language for conditions over streams of sensor readings")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG also applies
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a rule and replay events through it
    Check {
        /// The rule to compile
        rule: String,

        /// Events as JSON (reads from stdin if not provided)
        #[arg(short, long)]
        events: Option<String>,

        /// Bind a constant before compiling, as NAME=VALUE
        #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
        defines: Vec<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate syntax, don't compile or execute
        #[arg(long)]
        syntax_only: bool,

        /// Print the compiled fragments instead of executing
        #[arg(long)]
        emit: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let result = match cli.command {
        Commands::Check {
            rule,
            events,
            defines,
            pretty,
            syntax_only,
            emit,
        } => run_check(rule, events, defines, pretty, syntax_only, emit),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_check(
    rule: String,
    events: Option<String>,
    defines: Vec<String>,
    pretty: bool,
    syntax_only: bool,
    emit: bool,
) -> Result<(), CliError> {
    let defines = defines
        .iter()
        .map(|arg| cli::parse_define(arg))
        .collect::<Result<Vec<_>, _>>()?;

    let events = match events {
        Some(s) => Some(s),
        None if !syntax_only && !emit && !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).map_err(CliError::Io)?;
            Some(buffer)
        }
        None => None,
    };

    let options = CheckOptions {
        rule,
        events,
        defines,
        syntax_only,
        emit,
    };

    match cli::execute_check(&options)? {
        CheckResult::SyntaxValid => println!("Syntax is valid"),
        CheckResult::Compiled { entry, fragments } => {
            println!("{}", entry);
            for fragment in fragments {
                println!("{}", fragment);
            }
        }
        CheckResult::Matched(output) => {
            let json = if pretty {
                serde_json::to_string_pretty(&output)
            } else {
                serde_json::to_string(&output)
            }?;
            println!("{}", json);
        }
    }
    Ok(())
}
