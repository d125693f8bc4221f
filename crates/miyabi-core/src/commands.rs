use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument};

use crate::cli::{Command, FocusAction};
use crate::config::Config;
use crate::datetime;
use crate::interchange;
use crate::notify::CompositeNotifier;
use crate::render::Renderer;
use crate::scheduler::ReminderScheduler;
use crate::store::TaskStore;
use crate::task::{Priority, Repeat, Task};
use crate::view::{PriorityFilter, SortKey, SortState, StatusFilter, ViewQuery, build_view};

pub const FOCUS_FILE: &str = "focus.data";

#[instrument(skip(store, cfg, data_dir, renderer, command))]
pub fn dispatch(
    store: &mut TaskStore,
    cfg: &Config,
    data_dir: &Path,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Add {
            text,
            priority,
            repeat,
            remind,
        } => cmd_add(store, &text, priority, repeat, remind.as_deref()),
        Command::List {
            search,
            status,
            priority,
            sort,
        } => cmd_list(store, renderer, search, status, priority, &sort),
        Command::Done { id } => cmd_done(store, id),
        Command::Rm { id } => cmd_rm(store, id),
        Command::Clear => cmd_clear(store),
        Command::Edit { id, text } => cmd_edit(store, id, &text),
        Command::Priority { id, priority } => cmd_priority(store, id, priority),
        Command::Remind { id, when } => cmd_remind(store, id, when.as_deref()),
        Command::Move { dragged, target } => cmd_move(store, dragged, target),
        Command::Focus { action } => cmd_focus(store, action),
        Command::Export => cmd_export(store),
        Command::Import { path } => cmd_import(store, &path),
        Command::Calendar { id } => cmd_calendar(store, id),
        Command::Watch => cmd_watch(store, cfg),
    }?;

    if let Some(alert) = store.take_alert() {
        eprintln!("warning: {alert}");
    }

    store
        .focus()
        .save(&data_dir.join(FOCUS_FILE))
        .context("failed to save focus session")?;

    Ok(())
}

/// Completed tasks are not edited through the normal edit flows; deleting
/// and un-completing stay allowed.
fn ensure_editable(store: &TaskStore, id: u64) -> anyhow::Result<()> {
    match store.get(id) {
        Some(task) if task.completed => Err(anyhow!(
            "task {id} is completed; un-complete it before editing"
        )),
        // Unknown ids fall through to the store's own not-found handling.
        _ => Ok(()),
    }
}

#[instrument(skip(store, text))]
fn cmd_add(
    store: &mut TaskStore,
    text: &[String],
    priority: Priority,
    repeat: Repeat,
    remind: Option<&str>,
) -> anyhow::Result<()> {
    info!("command add");

    let reminder = remind.map(datetime::parse_reminder).transpose()?;
    let id = store.add(&text.join(" "), priority, repeat, reminder)?;
    println!("Created task {id}.");
    Ok(())
}

#[instrument(skip(store, renderer, search, sort))]
fn cmd_list(
    store: &mut TaskStore,
    renderer: &mut Renderer,
    search: String,
    status: StatusFilter,
    priority: PriorityFilter,
    sort: &[SortKey],
) -> anyhow::Result<()> {
    info!("command list");

    let mut sort_state = SortState::default();
    for key in sort {
        sort_state.toggle(*key);
    }

    let query = ViewQuery {
        search,
        status,
        priority,
        sort: sort_state,
    };
    let now = datetime::now_local();
    let view = build_view(store.tasks(), &query, now);
    renderer.print_view(&view, now)
}

#[instrument(skip(store))]
fn cmd_done(store: &mut TaskStore, id: u64) -> anyhow::Result<()> {
    info!("command done");

    let now = datetime::now_local();
    store.toggle(id, now)?;
    let task = store
        .get(id)
        .ok_or_else(|| anyhow!("task {id} disappeared during toggle"))?;
    if task.completed {
        println!("Completed task {id}.");
    } else {
        println!("Reopened task {id}.");
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_rm(store: &mut TaskStore, id: u64) -> anyhow::Result<()> {
    info!("command rm");

    let removed = store.remove(id)?;
    println!("Deleted task {} ({}).", removed.id, removed.text);
    Ok(())
}

#[instrument(skip(store))]
fn cmd_clear(store: &mut TaskStore) -> anyhow::Result<()> {
    info!("command clear");

    let cleared = store.clear_completed();
    println!("Cleared {cleared} completed task(s).");
    Ok(())
}

#[instrument(skip(store, text))]
fn cmd_edit(store: &mut TaskStore, id: u64, text: &[String]) -> anyhow::Result<()> {
    info!("command edit");

    ensure_editable(store, id)?;
    store.update_text(id, &text.join(" "))?;
    println!("Updated task {id}.");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_priority(store: &mut TaskStore, id: u64, priority: Priority) -> anyhow::Result<()> {
    info!("command priority");

    ensure_editable(store, id)?;
    store.update_priority(id, priority)?;
    println!("Set task {id} priority to {priority}.");
    Ok(())
}

#[instrument(skip(store, when))]
fn cmd_remind(store: &mut TaskStore, id: u64, when: Option<&str>) -> anyhow::Result<()> {
    info!("command remind");

    ensure_editable(store, id)?;
    let reminder = when.map(datetime::parse_reminder).transpose()?;
    store.update_reminder(id, reminder)?;
    match reminder {
        Some(at) => println!("Task {id} will remind at {}.", datetime::format_reminder(at)),
        None => println!("Cleared reminder for task {id}."),
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_move(store: &mut TaskStore, dragged: u64, target: u64) -> anyhow::Result<()> {
    info!("command move");

    // Reordering only makes sense among non-completed tasks.
    ensure_editable(store, dragged)?;
    ensure_editable(store, target)?;
    store.reorder(dragged, target)?;
    println!("Moved task {dragged} to task {target}'s slot.");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_focus(store: &mut TaskStore, action: FocusAction) -> anyhow::Result<()> {
    info!("command focus");

    let now = datetime::now_local();
    match action {
        FocusAction::Start { id } => {
            ensure_editable(store, id)?;
            store.start_focus(id, now)?;
            println!("Focusing task {id}.");
        }
        FocusAction::Stop => match store.end_focus(now) {
            Some((id, elapsed)) => {
                println!("Ended focus on task {id} after {elapsed}s.");
            }
            None => println!("No focus session active."),
        },
        FocusAction::Show => match store.focus().active_task() {
            Some(id) => {
                let text = store.get(id).map(|task| task.text.as_str()).unwrap_or("?");
                println!("Focused: task {id} ({text}).");
            }
            None => println!("No focus session active."),
        },
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_export(store: &mut TaskStore) -> anyhow::Result<()> {
    info!("command export");

    print!("{}", interchange::export_csv(store.tasks()));
    Ok(())
}

#[instrument(skip(store))]
fn cmd_import(store: &mut TaskStore, path: &PathBuf) -> anyhow::Result<()> {
    info!("command import");

    let input = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed reading stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?
    };

    let parsed = interchange::parse_csv(&input);
    let imported = store.import(parsed.tasks);
    if parsed.skipped > 0 {
        println!(
            "Imported {imported} task(s); skipped {} malformed row(s).",
            parsed.skipped
        );
    } else {
        println!("Imported {imported} task(s).");
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_calendar(store: &mut TaskStore, id: u64) -> anyhow::Result<()> {
    info!("command calendar");

    let task = store
        .get(id)
        .ok_or_else(|| anyhow!("no task with id {id}"))?;
    let reminder = task
        .reminder
        .ok_or_else(|| anyhow!("task {id} has no reminder to schedule"))?;
    println!("{}", interchange::calendar_url(&task.text, reminder));
    Ok(())
}

#[instrument(skip(store, cfg))]
fn cmd_watch(store: &mut TaskStore, cfg: &Config) -> anyhow::Result<()> {
    info!("command watch");

    let (tx, rx) = mpsc::channel::<Vec<Task>>();
    let subscription = store.subscribe(Box::new(move |tasks| {
        let _ = tx.send(tasks);
    }));
    if subscription.is_some() {
        debug!("push subscription active");
    }

    let scheduler = ReminderScheduler::new(cfg.poll_interval());
    let notifier = CompositeNotifier::with_default_sinks();

    println!(
        "Watching reminders every {}s; press Ctrl-C to stop.",
        cfg.poll_interval().as_secs()
    );
    scheduler.run(store, &notifier, move |store| {
        // Remote-originated snapshots replace the whole collection.
        while let Ok(snapshot) = rx.try_recv() {
            store.replace_all(snapshot);
        }
        if let Some(alert) = store.take_alert() {
            eprintln!("warning: {alert}");
        }
    });

    Ok(())
}
