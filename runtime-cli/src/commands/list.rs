//! `runtime list [-a] [-f json|table]` (spec.md §6.1, §4.7, §8 scenarios 1-3).

use clap::Args;
use tabled::settings::Style;
use tabled::Tabled;

use runtime_shared::errors::RuntimeResult;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Accepted for interface compatibility; every container directory is
    /// always listed regardless of status (spec.md §8 scenario 3 expects a
    /// dead-pid container to show up as `stopped` under plain `list`).
    #[arg(short = 'a', long = "all")]
    pub all: bool,

    #[arg(short = 'f', long = "format", default_value = "table")]
    pub format: String,
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "PID")]
    pid: i32,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "BUNDLE")]
    bundle: String,
    #[tabled(rename = "CREATED")]
    created: String,
}

pub fn execute(args: ListArgs, global: &GlobalFlags) -> RuntimeResult<()> {
    let _ = args.all;
    let docs = global.orchestrator().list()?;

    match args.format.as_str() {
        "json" => {
            if docs.is_empty() {
                println!("null");
            } else {
                println!("{}", serde_json::to_string(&docs)?);
            }
        }
        _ => {
            let rows: Vec<Row> = docs
                .into_iter()
                .map(|doc| Row {
                    id: doc.id,
                    pid: doc.pid,
                    status: doc.status.to_string(),
                    bundle: doc.bundle_path,
                    created: doc.created.to_rfc3339(),
                })
                .collect();
            let mut table = tabled::Table::new(rows);
            table.with(Style::blank());
            println!("{}", table);
        }
    }
    Ok(())
}
