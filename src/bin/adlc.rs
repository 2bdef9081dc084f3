//! ADLC command line driver.
//!
//! Parses one architecture description file, prints every diagnostic and
//! optionally a summary of the resulting model.

use adlc::{AdlError, AdlParser, AdlSession, SessionConfig};
use bumpalo::Bump;
use clap::Parser;
use std::fs;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "adlc")]
#[command(version)]
#[command(about = "Architecture Description Language front end")]
struct Cli {
    /// Architecture description file to parse
    file: String,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Do not print diagnostics
    #[arg(short, long)]
    quiet: bool,

    /// Wrap code blocks in #line markers
    #[arg(short = 'T', long = "line-markers")]
    line_markers: bool,

    /// Predefine a preprocessor symbol as NAME or NAME=VALUE
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    define: Vec<String>,

    /// Mark a preprocessor symbol as undefined
    #[arg(short = 'U', value_name = "NAME")]
    undefine: Vec<String>,

    /// Print a summary of the parsed model
    #[arg(long)]
    summary: bool,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(self.file.as_str())
            .with_location_markers(self.line_markers)
            .with_debug_level(self.verbose);
        for def in &self.define {
            config = match def.split_once('=') {
                Some((name, value)) => config.define(name, value),
                None => config.define(def.as_str(), "1"),
            };
        }
        for name in &self.undefine {
            config = config.undefine(name.as_str());
        }
        config
    }
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Info);
        }
        2 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder.init();
}

fn run(cli: &Cli) -> Result<bool, AdlError> {
    let text = fs::read_to_string(&cli.file).map_err(|source| AdlError::Io {
        path: cli.file.clone(),
        source,
    })?;

    let arena = Bump::new();
    let session = AdlSession::new(&arena, cli.session_config());
    let output = AdlParser::new(&session, &text).parse()?;

    if !cli.quiet && !output.diagnostics.is_empty() {
        eprintln!("{}", output.diagnostics);
    }
    if cli.summary {
        println!("{}", output.model);
        println!("{}", session.stats());
    }
    log::info!("Parsed {}", session.file_name());
    Ok(output.is_success())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("adlc: {}", e);
            ExitCode::FAILURE
        }
    }
}
