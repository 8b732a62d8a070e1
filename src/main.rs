//! # golite
//!
//! Command-line front end of the GoLite compiler: source text on standard
//! input (or from a file path), LLIR on standard output.
use std::{
    error::Error,
    fs,
    io::{self, Read},
};

use clap::{Parser, ValueEnum};
use log::error;

/// CLI configuration for the GoLite compiler.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to the source file; standard input is read when omitted.
    #[arg(index = 1)]
    file: Option<std::path::PathBuf>,

    /// Specify the log level of the compiler.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    verbosity: LogLevel,
}

/// Enum for specifying the log level of the compiler.
#[derive(ValueEnum, Clone, Default, Debug)]
enum LogLevel {
    /// Only critical errors will be logged.
    #[default]
    #[value(alias("0"))]
    Error,

    /// Also log warnings.
    #[value(alias("1"))]
    Warn,

    /// Log information about the general state of the compiler.
    #[value(alias("2"))]
    Info,

    /// Log everything which happens internally in the compiler.
    #[value(alias("3"))]
    Debug,

    /// Log extra information.
    #[value(alias("4"))]
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    simple_logger::init_with_level((&args.verbosity).into()).unwrap();

    let source = match &args.file {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    match golite::compile(&source) {
        Ok(module) => {
            print!("{module}");
            Ok(())
        }
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    }
}
