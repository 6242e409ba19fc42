use std::time::Duration;

use clap::Parser;
use tracing::warn;

use crate::service::{DEFAULT_INTERVAL, DEFAULT_METHOD, KeepAliveMethod};

#[derive(Parser, Debug)]
#[command(name = "stayawake", version)]
#[command(about = "Keeps the system awake until you tell it not to", long_about = None)]
pub struct Args {
    /// Keep-alive method: ExecutionState, MouseJiggle or Hybrid
    pub method: Option<String>,
    /// Seconds between keep-alive ticks
    pub interval: Option<String>,
}

/// A usable configuration plus messages about anything that was ignored.
pub struct ResolvedArgs {
    pub method: KeepAliveMethod,
    pub interval: Duration,
    pub complaints: Vec<String>,
}

impl Args {
    /// Resolves the raw arguments. Anything that does not parse falls back
    /// to a default instead of aborting the program.
    pub fn resolve(&self) -> ResolvedArgs {
        let mut complaints = vec![];

        let method = match &self.method {
            None => DEFAULT_METHOD,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Unrecognized method argument {raw:?}");
                complaints.push(format!("Unknown method '{raw}', using {DEFAULT_METHOD}."));
                DEFAULT_METHOD
            }),
        };

        let interval = match &self.interval {
            None => DEFAULT_INTERVAL,
            Some(raw) => match raw.parse::<u64>() {
                Ok(seconds) if seconds > 0 => Duration::from_secs(seconds),
                _ => {
                    warn!("Invalid interval argument {raw:?}");
                    complaints.push(format!(
                        "Invalid interval '{raw}', using {} seconds.",
                        DEFAULT_INTERVAL.as_secs()
                    ));
                    DEFAULT_INTERVAL
                }
            },
        };

        ResolvedArgs {
            method,
            interval,
            complaints,
        }
    }
}
