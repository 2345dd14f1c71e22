use clap::Args;
use serde_json::json;

use tally_engine::{gate, FieldUndoOutcome, GateDecision, JournalEntry, UndoTarget};

use crate::mutate::confirm;
use crate::render::{print_json, print_table, value_string};
use crate::{App, OutputFormat, EXIT_CONFLICT, EXIT_OK};

#[derive(Debug, Clone, Args)]
pub(crate) struct UndoArgs {
    /// Undo a specific journal entry instead of the most recent eligible one
    #[arg(long)]
    pub seq: Option<u64>,
}

pub(crate) fn run(app: &App, args: &UndoArgs) -> anyhow::Result<u8> {
    let target = match args.seq {
        Some(seq) => UndoTarget::Seq(seq),
        None => UndoTarget::Last,
    };

    match gate::decide(true, app.dry_run, app.yes, App::interactive()) {
        GateDecision::DryRun => dry_run(app, target),
        GateDecision::RefuseNonInteractive => {
            anyhow::bail!("refusing to write in non-interactive mode without --yes")
        }
        GateDecision::RequireConfirmation => {
            let entry = resolve_for_display(app, target)?;
            confirm(&format!(
                "Undo entry #{} ({}): {}",
                entry.seq,
                entry.entity,
                field_list(&entry)
            ))?;
            execute(app, target)
        }
        GateDecision::Execute => execute(app, target),
    }
}

fn resolve_for_display(app: &App, target: UndoTarget) -> anyhow::Result<JournalEntry> {
    match target {
        UndoTarget::Seq(seq) => app
            .journal
            .entry(seq)?
            .ok_or_else(|| anyhow::anyhow!("no journal entry with sequence number {seq}")),
        UndoTarget::Last => app
            .journal
            .recent(0)?
            .into_iter()
            .find(|e| e.applied_fields().next().is_some())
            .ok_or_else(|| anyhow::anyhow!("nothing to undo")),
    }
}

fn field_list(entry: &JournalEntry) -> String {
    entry
        .applied_fields()
        .map(|c| {
            format!(
                "{}: {} -> {}",
                c.field,
                value_string(&c.new),
                value_string(&c.old)
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn dry_run(app: &App, target: UndoTarget) -> anyhow::Result<u8> {
    let entry = resolve_for_display(app, target)?;
    match app.output {
        OutputFormat::Json => print_json(&json!({
            "dry_run": true,
            "seq": entry.seq,
            "kind": entry.entity.kind.as_str(),
            "id": entry.entity.id,
            "would_restore": entry
                .applied_fields()
                .map(|c| json!({"field": c.field, "from": c.new, "to": c.old}))
                .collect::<Vec<_>>(),
        })),
        OutputFormat::Text => {
            if !app.quiet {
                println!(
                    "dry-run: would undo entry #{} ({}): {}",
                    entry.seq,
                    entry.entity,
                    field_list(&entry)
                );
            }
        }
    }
    Ok(EXIT_OK)
}

fn execute(app: &App, target: UndoTarget) -> anyhow::Result<u8> {
    let report = app.engine().undo(target)?;

    match app.output {
        OutputFormat::Json => {
            let fields: Vec<_> = report
                .fields
                .iter()
                .map(|f| match &f.outcome {
                    FieldUndoOutcome::Restored => json!({
                        "field": f.field, "result": "restored"
                    }),
                    FieldUndoOutcome::AlreadyAtOldValue => json!({
                        "field": f.field, "result": "already_at_old_value"
                    }),
                    FieldUndoOutcome::Conflicted { expected, actual } => json!({
                        "field": f.field,
                        "result": "conflict",
                        "expected": expected,
                        "actual": actual,
                    }),
                })
                .collect();
            print_json(&json!({
                "undone_seq": report.seq,
                "kind": report.entity.kind.as_str(),
                "id": report.entity.id,
                "journaled_as": report.undo_seq,
                "fields": fields,
            }));
        }
        OutputFormat::Text => {
            if !app.quiet {
                match report.undo_seq {
                    Some(seq) => println!(
                        "undo of entry #{} ({}) journaled as #{seq}",
                        report.seq, report.entity
                    ),
                    None => println!("undo of entry #{} ({})", report.seq, report.entity),
                }
                let rows: Vec<Vec<String>> = report
                    .fields
                    .iter()
                    .map(|f| {
                        let (result, detail) = match &f.outcome {
                            FieldUndoOutcome::Restored => {
                                ("restored".to_string(), String::new())
                            }
                            FieldUndoOutcome::AlreadyAtOldValue => (
                                "restored".to_string(),
                                "already at old value".to_string(),
                            ),
                            FieldUndoOutcome::Conflicted { expected, actual } => (
                                "conflict".to_string(),
                                format!(
                                    "expected {}, found {}",
                                    value_string(expected),
                                    value_string(actual)
                                ),
                            ),
                        };
                        vec![f.field.clone(), result, detail]
                    })
                    .collect();
                print_table(&["field", "result", "detail"], &rows);
            }
        }
    }

    Ok(if report.has_conflicts() {
        EXIT_CONFLICT
    } else {
        EXIT_OK
    })
}
