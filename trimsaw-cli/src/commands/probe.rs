//! Implementation of the 'probe' subcommand.
//!
//! Runs a single ffprobe extraction and prints the resulting metadata as
//! JSON, flagging fields the container left unset.

use log::warn;

use trimsaw_core::error::CoreResult;
use trimsaw_core::probe::{FfprobeProber, MediaProber};

use crate::cli::ProbeArgs;

pub fn run_probe(args: ProbeArgs) -> CoreResult<()> {
    let prober = FfprobeProber::new(args.probe_token);
    let metadata = prober.probe(&args.locator, args.with_auth)?;

    let missing = metadata.missing_fields();
    if !missing.is_empty() {
        warn!("{} left fields unset: {}", args.locator, missing.join(", "));
    }
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}
