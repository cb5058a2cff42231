use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use mon_trace::{list_metrics, list_modes, run, Command, Options};

fn main() -> ExitCode {
    let options = Options::parse();

    let default_filter = if options.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match execute(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::debug!("aborting: {:?}", err);
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn execute(options: &Options) -> Result<()> {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    match options.command()? {
        Command::ListModes => list_modes(&mut out)?,
        Command::ListMetrics => list_metrics(&mut out)?,
        Command::Run(config) => {
            run(&config, &mut out)?;
        }
    }

    out.flush()?;
    Ok(())
}
