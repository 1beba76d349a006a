use atc_listener::app::{Options, RealScanner, RunError, run_with_io};
use atc_listener::indicator::{NoIndicator, StatusIndicator, SysfsLed};
use clap::Parser;
use log::{LevelFilter, error};
use std::panic::{self, PanicHookInfo};

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

/// Log to stderr at `info`, or `debug` when verbose. `RUST_LOG` takes precedence.
fn init_logging(verbose: bool) {
    env_logger::Builder::new()
        .filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .format_timestamp_secs()
        .parse_default_env()
        .init();
}

/// Run scan cycles until the scanner stops or the cycle limit is reached.
///
/// Readings and cycle summaries go to stdout, verbose rejection reasons to stderr.
async fn run(options: Options) -> Result<(), RunError> {
    let mut indicator: Box<dyn StatusIndicator> = match options.status_led.as_deref() {
        Some(name) => Box::new(SysfsLed::new(name)),
        None => Box::new(NoIndicator),
    };

    let mut out = std::io::stdout().lock();
    let mut err = std::io::stderr();
    run_with_io(options, &RealScanner, indicator.as_mut(), &mut out, &mut err).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd, Telegraf execd) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();
    init_logging(options.verbose);

    match run(options).await {
        Ok(_) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            error!("{}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
