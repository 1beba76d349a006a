//! Scan scheduler (business logic) for `atc-listener`.
//!
//! This module is intentionally decoupled from CLI parsing and process exit codes
//! so it can be tested deterministically with an injected scanner, status
//! indicator and output streams.

use crate::advertisement::Advertisement;
use crate::classifier::{Classification, Classifier, DEFAULT_NAME_FILTER, NameFilter};
use crate::cycle::CycleSummary;
use crate::duration::parse_duration;
use crate::indicator::StatusIndicator;
use crate::output::{OutputFormat, OutputFormatter};
use crate::reading::TemperatureUnit;
use crate::scanner::{Backend, ScanError, ScanParameters, ScanParametersError};
use clap::Parser;
use log::{debug, info};
use std::future::Future;
use std::io;
use std::io::Write;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Configuration for the scan loop.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Only decode devices whose advertised name contains this text.
    #[arg(long, default_value = DEFAULT_NAME_FILTER, value_name = "TEXT")]
    pub name_filter: NameFilter,

    /// Unit for reported temperatures
    #[arg(long, default_value_t, value_enum)]
    pub unit: TemperatureUnit,

    /// Length of one scan cycle; counts are reported and reset after each cycle.
    /// Accepts duration with suffix: 5s, 1m, 500ms, 2h.
    /// Without suffix, value is interpreted as seconds.
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub scan_duration: Duration,

    /// Radio scan interval (HCI backend)
    #[arg(long, default_value = "100ms", value_parser = parse_duration)]
    pub scan_interval: Duration,

    /// Radio scan window, at most the scan interval (HCI backend)
    #[arg(long, default_value = "99ms", value_parser = parse_duration)]
    pub scan_window: Duration,

    /// Request scan responses from advertisers (HCI backend).
    /// Needed for sensors that only send their name in the scan response.
    #[arg(long)]
    pub active: bool,

    /// Stop after this many scan cycles instead of running forever
    #[arg(long, value_name = "N")]
    pub cycles: Option<u64>,

    /// Bluetooth scanner backend to use
    #[arg(long, default_value_t, value_enum)]
    pub backend: Backend,

    /// Output format for readings
    #[arg(long, default_value_t, value_enum)]
    pub format: OutputFormat,

    /// The name of the measurement in InfluxDB line protocol.
    #[arg(long, default_value = "atc_measurement")]
    pub influxdb_measurement: String,

    /// Switch this LED (from /sys/class/leds) on while a scan cycle runs
    #[arg(long, value_name = "NAME")]
    pub status_led: Option<String>,

    /// Verbose output, print why advertisements were not decoded
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Options {
    /// Validated radio scan parameters.
    pub fn scan_parameters(&self) -> Result<ScanParameters, ScanParametersError> {
        ScanParameters::new(self.scan_interval, self.scan_window, self.active)
    }
}

/// Errors returned by the scan loop.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ScanParametersError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Scanner abstraction to enable deterministic unit tests without Bluetooth hardware.
pub trait Scanner: Send + Sync {
    fn start_scan(
        &self,
        backend: Backend,
        parameters: ScanParameters,
    ) -> Pin<
        Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, ScanError>> + Send + '_>,
    >;
}

/// Real scanner implementation that delegates to the compiled-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn start_scan(
        &self,
        backend: Backend,
        parameters: ScanParameters,
    ) -> Pin<
        Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, ScanError>> + Send + '_>,
    > {
        Box::pin(async move { crate::scanner::start_scan(backend, parameters).await })
    }
}

/// How a scan cycle ended.
enum CycleEnd {
    Elapsed,
    SourceClosed,
}

/// Classify records until `duration` elapses or the scanner stops.
///
/// Matches are formatted to `out` as they arrive. Rejections go to `err` only
/// when `verbose` is set.
async fn run_cycle(
    classifier: &Classifier,
    records: &mut mpsc::Receiver<Advertisement>,
    duration: Duration,
    formatter: &dyn OutputFormatter,
    verbose: bool,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(CycleSummary, CycleEnd), RunError> {
    let mut summary = CycleSummary::default();
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => return Ok((summary, CycleEnd::Elapsed)),
            record = records.recv() => {
                let Some(record) = record else {
                    return Ok((summary, CycleEnd::SourceClosed));
                };

                let classification = classifier.classify(&record);
                summary.record(&classification);

                match classification {
                    Classification::Match(sensor) => {
                        writeln!(out, "{}", formatter.format(&sensor))?;
                    }
                    Classification::Reject(reason) if verbose => {
                        writeln!(err, "{}: {}", record.address, reason)?;
                    }
                    Classification::Reject(_) => {}
                }
            }
        }
    }
}

/// Run scan cycles, writing formatted output to `out` and verbose diagnostics to `err`.
///
/// - Each cycle lasts `options.scan_duration`; `indicator` is on while it runs.
/// - After each cycle the summary of discovered and matched records is reported
///   and the next cycle starts from zero.
/// - Returns after `options.cycles` cycles, or when the scanner stops delivering
///   records (after reporting the partial cycle).
pub async fn run_with_io(
    options: Options,
    scanner: &dyn Scanner,
    indicator: &mut dyn StatusIndicator,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), RunError> {
    let classifier = Classifier::new(options.name_filter.clone(), options.unit);
    let formatter = options.format.formatter(&options.influxdb_measurement);
    let parameters = options.scan_parameters()?;

    let mut records = scanner.start_scan(options.backend, parameters).await?;
    info!(
        "Scanning with {} backend for names containing '{}'",
        options.backend,
        options.name_filter.as_str()
    );

    let mut completed: u64 = 0;
    loop {
        indicator.set_scanning(true);
        let result = run_cycle(
            &classifier,
            &mut records,
            options.scan_duration,
            formatter.as_ref(),
            options.verbose,
            out,
            err,
        )
        .await;
        indicator.set_scanning(false);

        let (summary, end) = result?;
        completed += 1;
        debug!("Scan cycle {completed} finished");

        // Formats without a summary line still report the counts
        match formatter.format_summary(&summary) {
            Some(line) => writeln!(out, "{line}")?,
            None => info!("{summary}"),
        }

        if let CycleEnd::SourceClosed = end {
            info!("Scanner stopped delivering advertisements");
            break;
        }
        if options.cycles.is_some_and(|limit| completed >= limit) {
            break;
        }
    }

    Ok(())
}
