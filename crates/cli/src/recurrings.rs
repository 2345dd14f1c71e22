use std::collections::BTreeMap;

use clap::{Args, Subcommand};
use serde_json::{json, Value};

use tally_client::RecurringId;
use tally_engine::{EntityKind, MutationRequest};

use crate::mutate::{run_write, WriteAction};
use crate::render::{print_json, print_table, shorten_id};
use crate::{App, OutputFormat, EXIT_OK};

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum RecurringsCmd {
    /// List recurring rules
    List,

    /// Edit one recurring rule
    Edit(EditArgs),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct EditArgs {
    pub id: RecurringId,

    /// One of DAILY, WEEKLY, BIWEEKLY, MONTHLY, QUARTERLY, ANNUALLY
    #[arg(long)]
    pub frequency: Option<String>,

    #[arg(long)]
    pub min_amount: Option<i64>,

    #[arg(long)]
    pub max_amount: Option<i64>,
}

pub(crate) fn run(app: &App, cmd: &RecurringsCmd) -> anyhow::Result<u8> {
    match cmd {
        RecurringsCmd::List => list(app),
        RecurringsCmd::Edit(args) => edit(app, args),
    }
}

fn list(app: &App) -> anyhow::Result<u8> {
    let items = app.client.list_recurrings()?;
    match app.output {
        OutputFormat::Json => print_json(&json!({ "recurrings": items })),
        OutputFormat::Text => {
            let rows: Vec<Vec<String>> = items
                .iter()
                .map(|r| {
                    vec![
                        shorten_id(r.id.as_str()),
                        r.name.clone().unwrap_or_default(),
                        r.frequency.clone().unwrap_or_default(),
                        r.min_amount.map(|v| v.to_string()).unwrap_or_default(),
                        r.max_amount.map(|v| v.to_string()).unwrap_or_default(),
                    ]
                })
                .collect();
            print_table(&["id", "name", "frequency", "min", "max"], &rows);
        }
    }
    Ok(EXIT_OK)
}

fn edit(app: &App, args: &EditArgs) -> anyhow::Result<u8> {
    let mut values: BTreeMap<String, Value> = BTreeMap::new();
    if let Some(frequency) = &args.frequency {
        values.insert("frequency".to_string(), json!(frequency));
    }
    if let Some(min) = args.min_amount {
        values.insert("min_amount".to_string(), json!(min));
    }
    if let Some(max) = args.max_amount {
        values.insert("max_amount".to_string(), json!(max));
    }
    if values.is_empty() {
        anyhow::bail!(
            "nothing to change; pass at least one of --frequency/--min-amount/--max-amount"
        );
    }

    let request = MutationRequest::new(EntityKind::Recurring, [args.id.as_str()], values);
    run_write(
        app,
        WriteAction::single(format!("Edit recurring {}", args.id), request),
    )
}
