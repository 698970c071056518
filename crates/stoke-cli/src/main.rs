//! stoke - habit tracking over a remote document store

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use config::{Args, Command};
use stoke_core::{Frequency, Habit, Session, SessionConfig};
use stoke_store::{DocumentStore, HttpStore, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("stoke={},warn", args.log_level).into()),
        )
        .init();

    if let Command::Demo = args.command {
        return demo(args.session_config()).await;
    }

    let user = args
        .user
        .clone()
        .context("no user id; set STOKE_USER or pass --user")?;
    let store: Arc<dyn DocumentStore> =
        Arc::new(HttpStore::connect(args.store_config()).context("store client")?);
    let session = Session::start(store, user, args.session_config()).await;

    let result = run(&session, &args.command).await;
    session.shutdown().await;
    result
}

async fn run(session: &Session, command: &Command) -> anyhow::Result<()> {
    match command {
        Command::List => {
            print_habits(session).await;
        }
        Command::Add {
            title,
            description,
            frequency,
        } => {
            let habit = session.add_habit(title, description, *frequency).await?;
            println!("added {} ({})", habit.title, habit.id);
        }
        Command::Complete { habit_id } => {
            if session.habit(habit_id).await.is_none() {
                bail!("unknown habit: {habit_id}");
            }
            session.complete_habit(habit_id).await?;
            wait_for(|| session.is_completed_today(habit_id), "completion").await;
            print_habits(session).await;
        }
        Command::Delete { habit_id } => {
            session.delete_habit(habit_id).await?;
            wait_for(|| async { session.habit(habit_id).await.is_none() }, "delete").await;
            println!("deleted {habit_id}");
        }
        Command::Watch => {
            watch(session).await;
        }
        Command::Demo => unreachable!("handled before session start"),
    }
    Ok(())
}

/// Print the habit list the way the cache sees it right now.
async fn print_habits(session: &Session) {
    let habits = session.habits().await;
    if habits.is_empty() {
        println!("no habits found");
        return;
    }
    for habit in habits {
        let done = if session.is_completed_today(&habit.id).await {
            "x"
        } else {
            " "
        };
        println!(
            "[{}] {:30} {:8} {} day streak  ({})",
            done,
            habit.title,
            habit.frequency.label(),
            habit.streak_count,
            habit.id,
        );
    }
}

/// Re-print the list whenever the snapshot changes, until ctrl-c.
async fn watch(session: &Session) {
    let mut last: Option<(Vec<Habit>, usize)> = None;
    loop {
        let snapshot = (session.habits().await, session.completed_today().await.len());
        if last.as_ref() != Some(&snapshot) {
            println!("---");
            print_habits(session).await;
            last = Some(snapshot);
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
        }
    }
}

async fn wait_for<F, Fut>(mut cond: F, what: &str)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if cond().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    info!("{what} not yet reflected locally; the store will converge it");
}

/// Scripted walkthrough over the in-memory store: exercises the full
/// reconciliation loop without a server.
async fn demo(config: SessionConfig) -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new(config.database_id.clone()));
    let session = Session::start(store.clone() as Arc<dyn DocumentStore>, "demo-user", config).await;

    println!("== fresh session");
    print_habits(&session).await;

    println!("== add \"Read\" (daily)");
    let habit = session.add_habit("Read", "20 pages", Frequency::Daily).await?;
    wait_for(|| async { !session.habits().await.is_empty() }, "habit list").await;
    print_habits(&session).await;

    println!("== complete it");
    session.complete_habit(&habit.id).await?;
    wait_for(|| session.is_completed_today(&habit.id), "completion").await;
    wait_for(
        || async { session.habit(&habit.id).await.map(|h| h.streak_count) == Some(1) },
        "streak",
    )
    .await;
    print_habits(&session).await;

    println!("== complete it again (same day, rejected)");
    session.complete_habit(&habit.id).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!(
        "completion records in store: {}",
        store.document_count("completions").await
    );
    print_habits(&session).await;

    println!("== delete it");
    session.delete_habit(&habit.id).await?;
    wait_for(|| async { session.habits().await.is_empty() }, "delete").await;
    print_habits(&session).await;

    session.shutdown().await;
    Ok(())
}
