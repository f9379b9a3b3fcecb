use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process;

use bzip2::read::BzDecoder;
use chrono::NaiveDate;
use clap::Parser;
use log::{error, info};

use rpslresolver::config::parse_rpsl_date;
use rpslresolver::emitters::{self, parse_arguments};
use rpslresolver::{PolicyDocument, PolicyError, ResolverConfig};

/// Resolve RPSL routing policy into per-peer export route tables.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// RPSL document to read; stdin when absent. `.bz2` files are decompressed.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// File to write the output to; stdout when absent.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "json")]
    emitter: String,

    /// Emitter argument as key=value. May be repeated.
    #[arg(short = 'a', long = "emitter-arg")]
    emitter_args: Vec<String>,

    /// List the available output formats and exit.
    #[arg(long)]
    list_emitters: bool,

    /// Date (YYYYMMDD) that withdrawn routes are checked against. Defaults to today.
    #[arg(long, value_parser = parse_date_arg)]
    reference_date: Option<NaiveDate>,

    /// Increase log verbosity. May be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_rpsl_date(value).map_err(|e| e.to_string())
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn BufRead>, PolicyError> {
    let Some(path) = path else {
        return Ok(Box::new(BufReader::new(io::stdin())));
    };
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "bz2") {
        info!("decompressing {}", path.display());
        Ok(Box::new(BufReader::new(BzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn run(cli: Cli) -> Result<(), PolicyError> {
    if cli.list_emitters {
        for name in emitters::emitter_names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut emitter = emitters::create_emitter(&cli.emitter)?;
    emitter.set_arguments(&parse_arguments(&cli.emitter_args))?;

    let mut config = ResolverConfig::new();
    if let Some(date) = cli.reference_date {
        config = config.with_reference_date(date);
    }

    let doc = PolicyDocument::from_reader_with_config(open_input(cli.input.as_ref())?, config)?;
    info!(
        "resolved {} aut-nums, {} speakers, {} peers",
        doc.aut_nums().len(),
        doc.speakers().len(),
        doc.peers().len()
    );

    let mut rendered = emitter.emit(&doc)?;
    if !rendered.is_empty() && !rendered.ends_with('\n') {
        rendered.push('\n');
    }

    match cli.output {
        Some(path) => fs::write(path, rendered)?,
        None => print!("{}", rendered),
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Err(e) = run(cli) {
        error!("{}", e);
        process::exit(1);
    }
}
