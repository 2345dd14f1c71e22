use clap::Args;
use serde_json::json;

use tally_engine::{EntityKind, EntityRef, EntryOrigin, JournalEntry};

use crate::render::{print_json, print_table, shorten_id, value_string};
use crate::{App, OutputFormat, EXIT_OK};

#[derive(Debug, Clone, Args)]
pub(crate) struct HistoryArgs {
    /// Filter to one entity kind (transaction, category, tag, recurring)
    #[arg(long, requires = "id")]
    pub kind: Option<EntityKind>,

    /// Filter to one entity id
    #[arg(long, requires = "kind")]
    pub id: Option<String>,

    /// Most recent entries to show (0 = all)
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

pub(crate) fn run(app: &App, args: &HistoryArgs) -> anyhow::Result<u8> {
    let entity = match (&args.kind, &args.id) {
        (Some(kind), Some(id)) => Some(EntityRef::new(*kind, id.clone())),
        _ => None,
    };
    let entries = app.engine().history(entity.as_ref(), args.limit)?;

    match app.output {
        OutputFormat::Json => print_json(&json!({ "entries": entries })),
        OutputFormat::Text => {
            if !app.quiet {
                let rows: Vec<Vec<String>> = entries
                    .iter()
                    .map(|e| {
                        vec![
                            e.seq.to_string(),
                            e.at.clone(),
                            format!("{}:{}", e.entity.kind, shorten_id(&e.entity.id)),
                            origin_string(e),
                            e.summary().to_string(),
                            changes_string(e),
                        ]
                    })
                    .collect();
                print_table(&["seq", "at", "entity", "via", "state", "changes"], &rows);
            }
        }
    }
    Ok(EXIT_OK)
}

fn origin_string(entry: &JournalEntry) -> String {
    match entry.origin {
        EntryOrigin::Apply => "apply".to_string(),
        EntryOrigin::UndoOf(seq) => format!("undo of #{seq}"),
        EntryOrigin::NativeUndoOf(seq) => format!("native undo of #{seq}"),
    }
}

fn changes_string(entry: &JournalEntry) -> String {
    entry
        .changes
        .iter()
        .map(|c| {
            format!(
                "{}: {} -> {}",
                c.field,
                value_string(&c.old),
                value_string(&c.new)
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}
