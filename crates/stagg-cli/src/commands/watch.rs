//! Watch command implementation.
//!
//! Keeps one kettle handle for the whole run. The library reconnects on
//! demand and answers failed polls from its last known state, so the
//! loop itself only has to keep time and print.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use stagg_core::{Kettle, KettleTransport};
use stagg_types::DeviceState;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::cli::{DeviceArgs, OutputFormat};
use crate::config::{Config, resolve_interval};
use crate::format::{FormatOptions, format_state_json_line, format_state_text};
use crate::style;
use crate::util::{append_output, open_kettle, resolve_target};

/// Arguments for the watch command.
pub struct WatchArgs<'a> {
    pub device: &'a DeviceArgs,
    pub interval: Option<u64>,
    pub count: u32,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
}

pub async fn cmd_watch(args: WatchArgs<'_>, config: &Config) -> Result<()> {
    let (address, kettle_config) = resolve_target(args.device, config)?;
    let period = resolve_interval(args.interval, config);
    let kettle = open_kettle(address, kettle_config).await?;

    if !args.quiet {
        eprintln!(
            "Watching {} every {}s | Press Ctrl+C to stop",
            style::format_device(kettle.address().as_str(), args.opts.no_color),
            period.as_secs()
        );
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let sink = Sink {
        format: args.format,
        output: args.output,
        opts: args.opts,
    };
    let polls = watch_loop(&kettle, period, args.count, &sink, shutdown).await?;

    if !args.quiet {
        eprintln!("Stopped after {} poll(s).", polls);
    }
    Ok(())
}

/// Where and how each poll result is written.
struct Sink<'a> {
    format: OutputFormat,
    output: Option<&'a PathBuf>,
    opts: &'a FormatOptions,
}

/// Poll on a fixed cadence until `count` polls are done or `shutdown` fires.
///
/// Returns the number of polls made. The link is released before returning.
async fn watch_loop<T, F>(
    kettle: &Kettle<T>,
    period: Duration,
    count: u32,
    sink: &Sink<'_>,
    shutdown: F,
) -> Result<u32>
where
    T: KettleTransport,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let label = kettle.address().as_str();
    let mut polls: u32 = 0;
    let result = loop {
        if count > 0 && polls >= count {
            break Ok(polls);
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => break Ok(polls),
            _ = ticker.tick() => {}
        }

        // A poll in flight is never abandoned; Ctrl+C is seen at the next tick.
        let state = kettle.poll().await;

        polls += 1;
        match state {
            Ok(state) => {
                if let Err(e) = render(sink, label, &state)
                    .and_then(|line| append_output(sink.output, &line))
                {
                    break Err(e);
                }
            }
            // Only a kettle that has never answered ends up here.
            Err(e) => {
                eprintln!(
                    "{}",
                    style::format_warning(&format!("No state yet: {}", e), sink.opts.no_color)
                );
            }
        }
    };

    debug!("Watch loop finished, disconnecting");
    if let Err(e) = kettle.disconnect().await {
        warn!("Disconnect failed: {}", e);
    }
    result
}

fn render(sink: &Sink<'_>, label: &str, state: &DeviceState) -> Result<String> {
    match sink.format {
        OutputFormat::Json => {
            let timestamp = OffsetDateTime::now_utc().format(&Rfc3339)?;
            format_state_json_line(&timestamp, label, state)
        }
        OutputFormat::Text => Ok(format_state_text(label, state, sink.opts)),
    }
}
