use std::collections::BTreeMap;

use clap::{Args, Subcommand};
use serde_json::{json, Value};

use tally_client::CategoryId;
use tally_engine::{EntityKind, MutationRequest};

use crate::mutate::{run_write, WriteAction};
use crate::render::{print_json, print_table, shorten_id};
use crate::{App, OutputFormat, EXIT_OK};

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum CategoriesCmd {
    /// List categories
    List(ListArgs),

    /// Edit one category
    Edit(EditArgs),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct ListArgs {
    /// Filter by name substring (case-insensitive)
    #[arg(long)]
    pub name_contains: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct EditArgs {
    pub id: CategoryId,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub emoji: Option<String>,

    #[arg(long)]
    pub color: Option<String>,

    #[arg(long)]
    pub excluded: Option<bool>,
}

pub(crate) fn run(app: &App, cmd: &CategoriesCmd) -> anyhow::Result<u8> {
    match cmd {
        CategoriesCmd::List(args) => list(app, args),
        CategoriesCmd::Edit(args) => edit(app, args),
    }
}

fn list(app: &App, args: &ListArgs) -> anyhow::Result<u8> {
    let query = args.name_contains.as_deref().map(str::to_lowercase);
    let items: Vec<_> = app
        .client
        .list_categories()?
        .into_iter()
        .filter(|c| match &query {
            Some(q) => c
                .name
                .as_deref()
                .map(|n| n.to_lowercase().contains(q))
                .unwrap_or(false),
            None => true,
        })
        .collect();

    match app.output {
        OutputFormat::Json => print_json(&json!({ "categories": items })),
        OutputFormat::Text => {
            let rows: Vec<Vec<String>> = items
                .iter()
                .map(|c| {
                    vec![
                        shorten_id(c.id.as_str()),
                        c.name.clone().unwrap_or_default(),
                        c.emoji.clone().unwrap_or_default(),
                        c.color.clone().unwrap_or_default(),
                        if c.excluded.unwrap_or(false) { "yes" } else { "" }.to_string(),
                    ]
                })
                .collect();
            print_table(&["id", "name", "emoji", "color", "excluded"], &rows);
        }
    }
    Ok(EXIT_OK)
}

fn edit(app: &App, args: &EditArgs) -> anyhow::Result<u8> {
    let mut values: BTreeMap<String, Value> = BTreeMap::new();
    if let Some(name) = &args.name {
        values.insert("name".to_string(), json!(name));
    }
    if let Some(emoji) = &args.emoji {
        values.insert("emoji".to_string(), json!(emoji));
    }
    if let Some(color) = &args.color {
        values.insert("color".to_string(), json!(color));
    }
    if let Some(excluded) = args.excluded {
        values.insert("excluded".to_string(), json!(excluded));
    }
    if values.is_empty() {
        anyhow::bail!("nothing to change; pass at least one of --name/--emoji/--color/--excluded");
    }

    let request = MutationRequest::new(EntityKind::Category, [args.id.as_str()], values);
    run_write(
        app,
        WriteAction::single(format!("Edit category {}", args.id), request),
    )
}
