use anyhow::{Context, Result};
use mailprobe_lib::{CheckOptions, Outcome, Settled, check_address};
use tracing_subscriber::EnvFilter;

use std::io::{self, BufRead};

#[path = "mailprobe-cli/args.rs"]
mod args;
#[path = "mailprobe-cli/output.rs"]
mod output;

use args::{Cli, Commands};

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "mailprobe_lib=info,warn",
        _ => "mailprobe_lib=debug,info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Une erreur devient un résultat normalisé, la suite du lot continue.
fn probe(address: &str, options: &CheckOptions) -> Outcome {
    match check_address(address, options) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(address, error = %err, timeout = err.is_timeout(), "check failed");
            Outcome::normalize(address.trim(), &Settled::Errored(&err))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let options = cli.probe.to_options()?;

    let mut addresses = Vec::new();
    if cli.stdin {
        for line in io::stdin().lock().lines() {
            let line = line.context("read stdin")?;
            if !line.trim().is_empty() {
                addresses.push(line);
            }
        }
    } else if let Some(Commands::Check { email }) = &cli.cmd {
        addresses.push(email.clone());
    } else {
        Cli::clap_command().print_help()?;
        println!();
        return Ok(());
    }

    let rows: Vec<Outcome> = addresses
        .iter()
        .map(|address| probe(address, &options))
        .collect();

    output::write_reports(&rows, &cli)?;

    // codes de sortie : 0 toutes valides, 2 au moins une non valide, 1 fatal
    if output::any_not_valid(&rows) {
        std::process::exit(2);
    }
    Ok(())
}
