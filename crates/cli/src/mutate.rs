//! The shared write pipeline: apply gate, confirmation, engine run, and
//! per-id outcome rendering.

use serde_json::json;

use tally_engine::{
    gate, BatchDisposition, GateDecision, MutationRequest, OutcomeStatus, PerIdOutcome,
};

use crate::render::{print_json, print_table, shorten_id, value_string};
use crate::{App, OutputFormat, EXIT_FAILURE, EXIT_OK, EXIT_PARTIAL};

/// One write command's worth of work.
///
/// Most commands produce a single request covering the whole id batch;
/// per-id requests appear when desired values differ by id (tag add/remove
/// computes the next tag set per transaction). `pre_failed` carries ids that
/// failed before a request could even be built, so the outcome table still
/// reports every id.
pub(crate) struct WriteAction {
    pub description: String,
    pub requests: Vec<MutationRequest>,
    pub pre_failed: Vec<PerIdOutcome>,
}

impl WriteAction {
    pub fn single(description: impl Into<String>, request: MutationRequest) -> Self {
        Self {
            description: description.into(),
            requests: vec![request],
            pre_failed: Vec::new(),
        }
    }
}

pub(crate) fn run_write(app: &App, action: WriteAction) -> anyhow::Result<u8> {
    match gate::decide(true, app.dry_run, app.yes, App::interactive()) {
        GateDecision::DryRun => render_dry_run(app, &action),
        GateDecision::RefuseNonInteractive => {
            anyhow::bail!("refusing to write in non-interactive mode without --yes")
        }
        GateDecision::RequireConfirmation => {
            confirm(&action.description)?;
            apply(app, action)
        }
        GateDecision::Execute => apply(app, action),
    }
}

pub(crate) fn confirm(description: &str) -> anyhow::Result<()> {
    eprintln!("{description}");
    eprintln!("Type 'yes' to proceed:");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    if input.trim() != "yes" {
        anyhow::bail!("aborted");
    }
    Ok(())
}

fn render_dry_run(app: &App, action: &WriteAction) -> anyhow::Result<u8> {
    let engine = app.engine();
    let mut plans = Vec::new();
    for request in &action.requests {
        plans.push(engine.preview(request)?);
    }

    match app.output {
        OutputFormat::Json => {
            let plans: Vec<_> = plans
                .iter()
                .map(|p| {
                    json!({
                        "kind": p.kind.as_str(),
                        "ids": p.ids,
                        "values": p.values,
                    })
                })
                .collect();
            print_json(&json!({ "dry_run": true, "plans": plans }));
        }
        OutputFormat::Text => {
            if !app.quiet {
                println!("dry-run: {}", action.description);
                for plan in &plans {
                    let values = plan
                        .values
                        .iter()
                        .map(|(field, value)| format!("{field}={}", value_string(value)))
                        .collect::<Vec<_>>()
                        .join(", ");
                    println!(
                        "  would set {} on {} {}(s): {}",
                        values,
                        plan.ids.len(),
                        plan.kind,
                        plan.ids.join(" ")
                    );
                }
            }
        }
    }
    Ok(EXIT_OK)
}

fn apply(app: &App, action: WriteAction) -> anyhow::Result<u8> {
    let engine = app.engine();
    let mut outcomes = Vec::new();
    for request in &action.requests {
        outcomes.extend(engine.plan_and_apply(request)?.outcomes);
    }
    outcomes.extend(action.pre_failed);

    render_outcomes(app, &outcomes);
    Ok(match tally_engine::disposition(&outcomes) {
        BatchDisposition::Success => EXIT_OK,
        BatchDisposition::PartialFailure => EXIT_PARTIAL,
        BatchDisposition::TotalFailure => EXIT_FAILURE,
    })
}

/// Per-id outcome report: always a table, never a single boolean.
pub(crate) fn render_outcomes(app: &App, outcomes: &[PerIdOutcome]) {
    match app.output {
        OutputFormat::Json => {
            let rows: Vec<_> = outcomes
                .iter()
                .map(|o| {
                    let (status, changes, error) = match &o.status {
                        OutcomeStatus::Applied { changes, .. } => (
                            "applied",
                            Some(
                                changes
                                    .iter()
                                    .map(|c| {
                                        json!({"field": c.field, "old": c.old, "new": c.new})
                                    })
                                    .collect::<Vec<_>>(),
                            ),
                            None,
                        ),
                        OutcomeStatus::SkippedNoOp { .. } => ("no-op", None, None),
                        OutcomeStatus::Failed { error } => {
                            ("failed", None, Some(error.to_string()))
                        }
                    };
                    json!({
                        "kind": o.entity.kind.as_str(),
                        "id": o.entity.id,
                        "status": status,
                        "changes": changes,
                        "seq": o.journal_seq,
                        "error": error,
                    })
                })
                .collect();
            print_json(&json!({ "outcomes": rows }));
        }
        OutputFormat::Text => {
            if app.quiet {
                return;
            }
            let rows: Vec<Vec<String>> = outcomes
                .iter()
                .map(|o| {
                    let (status, detail) = match &o.status {
                        OutcomeStatus::Applied { changes, .. } => (
                            "applied",
                            changes
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
                                .join("; "),
                        ),
                        OutcomeStatus::SkippedNoOp { .. } => {
                            ("no-op", "already up to date".to_string())
                        }
                        OutcomeStatus::Failed { error } => ("failed", error.to_string()),
                    };
                    vec![
                        shorten_id(&o.entity.id),
                        status.to_string(),
                        o.journal_seq.map(|s| s.to_string()).unwrap_or_default(),
                        detail,
                    ]
                })
                .collect();
            print_table(&["id", "result", "seq", "detail"], &rows);
        }
    }
}
