//! `runtime events <id> [--stats] [--interval N]` (spec.md §6.1).
//!
//! Polls the state document at `--interval` second intervals and prints a
//! one-line JSON event on every observed status change, until the
//! container reaches `stopped` or is no longer found.

use std::thread::sleep;
use std::time::Duration;

use clap::Args;

use runtime_shared::errors::RuntimeResult;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct EventsArgs {
    pub id: String,

    /// Include resource usage stats in each event (no resource accounting
    /// is implemented; this only changes the emitted JSON shape).
    #[arg(long)]
    pub stats: bool,

    #[arg(long, default_value_t = 5)]
    pub interval: u64,
}

pub fn execute(args: EventsArgs, global: &GlobalFlags) -> RuntimeResult<()> {
    let orchestrator = global.orchestrator();
    let mut last_status = None;

    loop {
        let doc = orchestrator
            .list()?
            .into_iter()
            .find(|d| d.id == args.id);

        let Some(doc) = doc else {
            println!(
                "{}",
                serde_json::json!({ "type": "container_deleted", "id": args.id })
            );
            return Ok(());
        };

        if last_status != Some(doc.status) {
            let mut event = serde_json::json!({ "type": "status", "id": doc.id, "status": doc.status.to_string() });
            if args.stats {
                event["stats"] = serde_json::json!({});
            }
            println!("{event}");
            last_status = Some(doc.status);
        }

        if doc.status == runtime::state::Status::Stopped {
            return Ok(());
        }

        sleep(Duration::from_secs(args.interval));
    }
}
