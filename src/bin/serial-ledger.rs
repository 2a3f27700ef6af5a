use std::{fs::File, time::Duration};

use anyhow::{Context, Result};
use serial_ledger::{
    LedgerError,
    bin_utils::{DEFAULT_SETTLE, Service},
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let filename = args
        .next()
        .context("Expected a file name as the first argument")?;
    let settle = args
        .next()
        .map(|ms| ms.parse::<u64>())
        .transpose()
        .context("Expected the settle time in milliseconds as the second argument")?
        .map_or(DEFAULT_SETTLE, Duration::from_millis);
    let file = File::open(&filename).with_context(|| format!("Failed to open `{filename}`"))?;

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        settle,
        error_printer: Box::new(|line, err| match err {
            LedgerError::Timeout => eprintln!("Request at line {line} is still blocked"),
            err => eprintln!("Error at line {line}: {err}"),
        }),
    };
    service.run()
}
