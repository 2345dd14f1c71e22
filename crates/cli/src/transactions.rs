use std::collections::{BTreeMap, BTreeSet};

use clap::{builder::ArgGroup, Args, Subcommand, ValueEnum};
use serde_json::{json, Value};

use tally_client::{CategoryId, RecurringId, TagId, TransactionId};
use tally_engine::{
    CaptureError, EntityKind, EntityRef, MutationError, MutationRequest, OutcomeStatus,
    PerIdOutcome, RemoteReader,
};

use crate::mutate::{run_write, WriteAction};
use crate::render::{money_string, print_json, print_kv, print_table, shorten_id};
use crate::{App, OutputFormat, EXIT_OK};

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum TransactionsCmd {
    /// List transactions
    List(ListArgs),

    /// Show one transaction
    Show { id: TransactionId },

    /// Mark transactions reviewed
    Review(IdsArgs),

    /// Mark transactions not reviewed
    Unreview(IdsArgs),

    /// Set the category for transactions
    SetCategory(SetCategoryArgs),

    /// Set or clear notes on transactions
    SetNotes(SetNotesArgs),

    /// Replace, add to, or remove from transaction tag sets
    SetTags(SetTagsArgs),

    /// Assign transactions to a recurring rule, or clear the assignment
    AssignRecurring(AssignRecurringArgs),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct ListArgs {
    #[arg(long, default_value_t = 25)]
    pub limit: usize,

    /// Only reviewed transactions
    #[arg(long, conflicts_with = "unreviewed")]
    pub reviewed: bool,

    /// Only unreviewed transactions
    #[arg(long, conflicts_with = "reviewed")]
    pub unreviewed: bool,

    /// Filter to a specific category id
    #[arg(long)]
    pub category_id: Option<CategoryId>,

    /// Filter by name substring (case-insensitive)
    #[arg(long)]
    pub name_contains: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct IdsArgs {
    #[arg(required = true)]
    pub ids: Vec<TransactionId>,
}

#[derive(Debug, Clone, Args)]
#[command(group(
    ArgGroup::new("category_target")
        .required(true)
        .args(["category_id", "category"])
))]
pub(crate) struct SetCategoryArgs {
    #[arg(required = true)]
    pub ids: Vec<TransactionId>,

    #[arg(long)]
    pub category_id: Option<CategoryId>,

    /// Category by name (case-insensitive exact match)
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct SetNotesArgs {
    #[arg(required = true)]
    pub ids: Vec<TransactionId>,

    #[arg(long, conflicts_with = "clear", required_unless_present = "clear")]
    pub notes: Option<String>,

    /// Clear notes instead of setting them
    #[arg(long)]
    pub clear: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum TagUpdateMode {
    Set,
    Add,
    Remove,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct SetTagsArgs {
    #[arg(required = true)]
    pub ids: Vec<TransactionId>,

    #[arg(long, value_enum, default_value_t = TagUpdateMode::Set)]
    pub mode: TagUpdateMode,

    /// One or more tag ids (repeatable)
    #[arg(long = "tag-id", value_name = "TAG_ID")]
    pub tag_ids: Vec<TagId>,
}

#[derive(Debug, Clone, Args)]
#[command(group(
    ArgGroup::new("recurring_target")
        .required(true)
        .args(["recurring_id", "clear"])
))]
pub(crate) struct AssignRecurringArgs {
    #[arg(required = true)]
    pub ids: Vec<TransactionId>,

    #[arg(long)]
    pub recurring_id: Option<RecurringId>,

    /// Remove the recurring assignment
    #[arg(long)]
    pub clear: bool,
}

pub(crate) fn run(app: &App, cmd: &TransactionsCmd) -> anyhow::Result<u8> {
    match cmd {
        TransactionsCmd::List(args) => list(app, args),
        TransactionsCmd::Show { id } => show(app, id),
        TransactionsCmd::Review(args) => review(app, args, true),
        TransactionsCmd::Unreview(args) => review(app, args, false),
        TransactionsCmd::SetCategory(args) => set_category(app, args),
        TransactionsCmd::SetNotes(args) => set_notes(app, args),
        TransactionsCmd::SetTags(args) => set_tags(app, args),
        TransactionsCmd::AssignRecurring(args) => assign_recurring(app, args),
    }
}

fn list(app: &App, args: &ListArgs) -> anyhow::Result<u8> {
    let reviewed_filter = if args.reviewed {
        Some(true)
    } else if args.unreviewed {
        Some(false)
    } else {
        None
    };
    let items = app.client.list_transactions(args.limit, reviewed_filter)?;

    let name_query = args.name_contains.as_deref().map(str::to_lowercase);
    let items: Vec<_> = items
        .into_iter()
        .filter(|t| {
            if let Some(want) = &args.category_id {
                if t.category_id.as_ref() != Some(want) {
                    return false;
                }
            }
            if let Some(q) = &name_query {
                let name = t.name.as_deref().unwrap_or("").to_lowercase();
                if !name.contains(q) {
                    return false;
                }
            }
            true
        })
        .collect();

    match app.output {
        OutputFormat::Json => print_json(&json!({ "transactions": items })),
        OutputFormat::Text => {
            let rows: Vec<Vec<String>> = items
                .iter()
                .map(|t| {
                    vec![
                        t.date.clone().unwrap_or_default(),
                        t.name.clone().unwrap_or_default(),
                        money_string(t.amount.as_ref()),
                        if t.reviewed.unwrap_or(false) { "yes" } else { "" }.to_string(),
                        t.category_id
                            .as_ref()
                            .map(|c| c.to_string())
                            .unwrap_or_default(),
                        t.tags
                            .iter()
                            .map(|t| t.to_string())
                            .collect::<Vec<_>>()
                            .join(","),
                        shorten_id(t.id.as_str()),
                    ]
                })
                .collect();
            print_table(
                &["date", "name", "amount", "reviewed", "category", "tags", "id"],
                &rows,
            );
        }
    }
    Ok(EXIT_OK)
}

fn show(app: &App, id: &TransactionId) -> anyhow::Result<u8> {
    let Some(t) = app.client.get_transaction(id.as_str())? else {
        anyhow::bail!("transaction {id} not found");
    };
    match app.output {
        OutputFormat::Json => print_json(&serde_json::to_value(&t)?),
        OutputFormat::Text => print_kv(&[
            ("id", t.id.to_string()),
            ("date", t.date.unwrap_or_default()),
            ("name", t.name.unwrap_or_default()),
            ("amount", money_string(t.amount.as_ref())),
            ("reviewed", t.reviewed.unwrap_or(false).to_string()),
            (
                "category_id",
                t.category_id.map(|c| c.to_string()).unwrap_or_default(),
            ),
            ("notes", t.notes.unwrap_or_default()),
            (
                "tags",
                t.tags
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            (
                "recurring_id",
                t.recurring_id.map(|r| r.to_string()).unwrap_or_default(),
            ),
        ]),
    }
    Ok(EXIT_OK)
}

fn review(app: &App, args: &IdsArgs, reviewed: bool) -> anyhow::Result<u8> {
    let request = MutationRequest::new(
        EntityKind::Transaction,
        args.ids.iter().map(|id| id.as_str()),
        BTreeMap::from([("reviewed".to_string(), json!(reviewed))]),
    );
    let verb = if reviewed { "reviewed" } else { "not reviewed" };
    run_write(
        app,
        WriteAction::single(
            format!("Mark {} transaction(s) {verb}", args.ids.len()),
            request,
        ),
    )
}

fn set_category(app: &App, args: &SetCategoryArgs) -> anyhow::Result<u8> {
    let category_id = match (&args.category_id, &args.category) {
        (Some(id), _) => id.clone(),
        (None, Some(name)) => resolve_category_by_name(app, name)?,
        (None, None) => unreachable!("clap group requires one"),
    };
    let request = MutationRequest::new(
        EntityKind::Transaction,
        args.ids.iter().map(|id| id.as_str()),
        BTreeMap::from([("category_id".to_string(), json!(category_id.as_str()))]),
    );
    run_write(
        app,
        WriteAction::single(
            format!(
                "Set category {category_id} on {} transaction(s)",
                args.ids.len()
            ),
            request,
        ),
    )
}

fn set_notes(app: &App, args: &SetNotesArgs) -> anyhow::Result<u8> {
    let notes = if args.clear {
        Value::Null
    } else {
        json!(args.notes.clone().unwrap_or_default())
    };
    let request = MutationRequest::new(
        EntityKind::Transaction,
        args.ids.iter().map(|id| id.as_str()),
        BTreeMap::from([("notes".to_string(), notes)]),
    );
    let verb = if args.clear { "Clear" } else { "Set" };
    run_write(
        app,
        WriteAction::single(
            format!("{verb} notes on {} transaction(s)", args.ids.len()),
            request,
        ),
    )
}

fn set_tags(app: &App, args: &SetTagsArgs) -> anyhow::Result<u8> {
    if args.mode != TagUpdateMode::Set && args.tag_ids.is_empty() {
        anyhow::bail!("--tag-id is required for --mode add/remove");
    }

    let description = format!(
        "Update tags ({:?}) on {} transaction(s)",
        args.mode,
        args.ids.len()
    );

    if args.mode == TagUpdateMode::Set {
        let tags: Vec<String> = args.tag_ids.iter().map(|t| t.to_string()).collect();
        let request = MutationRequest::new(
            EntityKind::Transaction,
            args.ids.iter().map(|id| id.as_str()),
            BTreeMap::from([("tags".to_string(), json!(tags))]),
        );
        return run_write(app, WriteAction::single(description, request));
    }

    // Add/remove need each transaction's current tag set, which a dry run
    // must not read; describe the intent and stop.
    if app.dry_run {
        if !app.quiet {
            println!(
                "dry-run: {description}: {:?}",
                args.tag_ids
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
            );
        }
        return Ok(EXIT_OK);
    }

    let mut requests = Vec::new();
    let mut pre_failed = Vec::new();
    for id in &args.ids {
        let entity = EntityRef::new(EntityKind::Transaction, id.as_str());
        let current = match app.client.read_fields(&entity, &["tags"]) {
            Ok(values) => values,
            Err(e) => {
                pre_failed.push(PerIdOutcome {
                    entity,
                    status: OutcomeStatus::Failed {
                        error: MutationError::Capture(match e {
                            tally_engine::ReadError::NotFound { entity } => {
                                CaptureError::NotFound { entity }
                            }
                            tally_engine::ReadError::Transport { entity, detail } => {
                                CaptureError::ReadFailed { entity, detail }
                            }
                        }),
                    },
                    journal_seq: None,
                });
                continue;
            }
        };

        let mut next: BTreeSet<String> = current
            .get("tags")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        for tag in &args.tag_ids {
            match args.mode {
                TagUpdateMode::Add => {
                    next.insert(tag.to_string());
                }
                TagUpdateMode::Remove => {
                    next.remove(tag.as_str());
                }
                TagUpdateMode::Set => unreachable!("handled above"),
            }
        }

        requests.push(MutationRequest::new(
            EntityKind::Transaction,
            [id.as_str()],
            BTreeMap::from([(
                "tags".to_string(),
                json!(next.into_iter().collect::<Vec<_>>()),
            )]),
        ));
    }

    run_write(
        app,
        WriteAction {
            description,
            requests,
            pre_failed,
        },
    )
}

fn assign_recurring(app: &App, args: &AssignRecurringArgs) -> anyhow::Result<u8> {
    let (value, description) = match &args.recurring_id {
        Some(id) => (
            json!(id.as_str()),
            format!("Assign recurring {id} on {} transaction(s)", args.ids.len()),
        ),
        None => (
            Value::Null,
            format!(
                "Clear recurring assignment on {} transaction(s)",
                args.ids.len()
            ),
        ),
    };
    let request = MutationRequest::new(
        EntityKind::Transaction,
        args.ids.iter().map(|id| id.as_str()),
        BTreeMap::from([("recurring_id".to_string(), value)]),
    );
    run_write(app, WriteAction::single(description, request))
}

fn resolve_category_by_name(app: &App, name: &str) -> anyhow::Result<CategoryId> {
    let want = name.trim().to_lowercase();
    if want.is_empty() {
        anyhow::bail!("empty --category");
    }
    let categories = app.client.list_categories()?;
    let matches: Vec<_> = categories
        .into_iter()
        .filter(|c| {
            c.name
                .as_deref()
                .map(|n| n.to_lowercase() == want)
                .unwrap_or(false)
        })
        .collect();
    match matches.as_slice() {
        [] => anyhow::bail!("no category named {name:?}"),
        [one] => Ok(one.id.clone()),
        many => anyhow::bail!(
            "category name {name:?} is ambiguous ({} matches); use --category-id",
            many.len()
        ),
    }
}
