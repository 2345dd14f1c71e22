use std::collections::BTreeMap;

use clap::{Args, Subcommand};
use serde_json::{json, Value};

use tally_client::TagId;
use tally_engine::{EntityKind, MutationRequest};

use crate::mutate::{run_write, WriteAction};
use crate::render::{print_json, print_table, shorten_id};
use crate::{App, OutputFormat, EXIT_OK};

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum TagsCmd {
    /// List tags
    List,

    /// Edit one tag
    Edit(EditArgs),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct EditArgs {
    pub id: TagId,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub color: Option<String>,
}

pub(crate) fn run(app: &App, cmd: &TagsCmd) -> anyhow::Result<u8> {
    match cmd {
        TagsCmd::List => list(app),
        TagsCmd::Edit(args) => edit(app, args),
    }
}

fn list(app: &App) -> anyhow::Result<u8> {
    let items = app.client.list_tags()?;
    match app.output {
        OutputFormat::Json => print_json(&json!({ "tags": items })),
        OutputFormat::Text => {
            let rows: Vec<Vec<String>> = items
                .iter()
                .map(|t| {
                    vec![
                        shorten_id(t.id.as_str()),
                        t.name.clone().unwrap_or_default(),
                        t.color.clone().unwrap_or_default(),
                    ]
                })
                .collect();
            print_table(&["id", "name", "color"], &rows);
        }
    }
    Ok(EXIT_OK)
}

fn edit(app: &App, args: &EditArgs) -> anyhow::Result<u8> {
    let mut values: BTreeMap<String, Value> = BTreeMap::new();
    if let Some(name) = &args.name {
        values.insert("name".to_string(), json!(name));
    }
    if let Some(color) = &args.color {
        values.insert("color".to_string(), json!(color));
    }
    if values.is_empty() {
        anyhow::bail!("nothing to change; pass --name and/or --color");
    }

    let request = MutationRequest::new(EntityKind::Tag, [args.id.as_str()], values);
    run_write(
        app,
        WriteAction::single(format!("Edit tag {}", args.id), request),
    )
}
