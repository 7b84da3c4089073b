//! Command handlers. Each renders from the local cache first; network work
//! either happens explicitly (sync, writes) or in the background.

use anyhow::Result;
use chrono::{Local, TimeZone};

use sitecache_core::models::todo::categories;
use sitecache_core::models::{NewTodo, Todo};
use sitecache_core::sync::ReconcileOutcome;
use sitecache_core::SiteContext;

use crate::cli::{Command, ConfigCommand, ProfileCommand, ProjectCommand, TodoCommand};

pub async fn run(ctx: &SiteContext, command: Command) -> Result<()> {
    match command {
        Command::Status => status(ctx),
        Command::Sync { force } => sync(ctx, force).await,
        Command::Navigate { from, to } => {
            ctx.navigate(from);
            let scheduled = ctx.navigate(to);
            println!(
                "{} -> {}: {}",
                from,
                to,
                if scheduled { "reconciliation scheduled" } else { "no reconciliation" }
            );
            ctx.tasks().wait_idle().await;
            status(ctx)
        }
        Command::Todos(cmd) => todos(ctx, cmd).await,
        Command::Profile(ProfileCommand::Show) => profile(ctx),
        Command::Config(cmd) => config(ctx, cmd).await,
        Command::Projects(cmd) => projects(ctx, cmd).await,
    }
}

fn format_checked(ms: i64) -> String {
    if ms <= 0 {
        return "never".to_string();
    }
    match Local.timestamp_millis_opt(ms).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ms.to_string(),
    }
}

fn format_version(version: &str) -> &str {
    if version.is_empty() {
        "(none)"
    } else {
        version
    }
}

fn status(ctx: &SiteContext) -> Result<()> {
    let rows = [
        ("profile", ctx.profile().version(), ctx.profile().last_checked_at(), 1),
        ("todos", ctx.todos().version(), ctx.todos().last_checked_at(), ctx.todos().with_data(Vec::len)),
        ("config", ctx.site_config().version(), ctx.site_config().last_checked_at(), 1),
        (
            "projects",
            ctx.projects().store().version(),
            ctx.projects().store().last_checked_at(),
            ctx.projects().store().with_data(Vec::len),
        ),
    ];

    println!("{:<10} {:<16} {:<21} {}", "RESOURCE", "VERSION", "LAST CHECKED", "ITEMS");
    for (name, version, checked, items) in rows {
        println!("{:<10} {:<16} {:<21} {}", name, format_version(&version), format_checked(checked), items);
    }
    if let Some(message) = ctx.notice().current() {
        println!("\nerror: {}", message);
    }
    Ok(())
}

async fn sync(ctx: &SiteContext, force: bool) -> Result<()> {
    let outcomes = if force {
        ctx.force_refresh_all().await
    } else {
        ctx.reconcile_all().await
    };
    for (kind, outcome) in &outcomes {
        println!("{:<10} {}", kind.as_str(), outcome);
    }
    if outcomes
        .iter()
        .any(|(_, o)| matches!(o, ReconcileOutcome::OracleUnavailable | ReconcileOutcome::FetchFailed))
    {
        eprintln!("Some resources could not be checked; cached copies were kept.");
    }
    Ok(())
}

fn print_todo(todo: &Todo) {
    println!(
        "[{}] {:<26} {:<6} {:<8} {}",
        if todo.completed { "x" } else { " " },
        todo.display_id(),
        todo.priority.as_str(),
        todo.category,
        todo.text
    );
}

async fn todos(ctx: &SiteContext, cmd: TodoCommand) -> Result<()> {
    let actions = ctx.todo_actions();
    match cmd {
        TodoCommand::List => {
            let todos = ctx.todos().data();
            if todos.is_empty() {
                println!("No todos cached.");
            }
            for todo in &todos {
                print_todo(todo);
            }
            println!("\nCategories: {}", categories(&todos).join(", "));
        }
        TodoCommand::Add { text, priority, category } => {
            let todo = actions.add(NewTodo::new(text, priority, category)).await?;
            print_todo(&todo);
        }
        TodoCommand::Toggle { id } => {
            let completed = actions.toggle(&id).await?;
            println!("{} is now {}", id, if completed { "done" } else { "open" });
        }
        TodoCommand::Remove { id } => {
            actions.remove(&id).await?;
            println!("Removed {}", id);
        }
        TodoCommand::ClearCompleted => {
            let deleted = actions.delete_completed().await?;
            println!("Deleted {} completed todo(s)", deleted);
        }
    }
    Ok(())
}

fn profile(ctx: &SiteContext) -> Result<()> {
    let cached = ctx.profile().data();
    println!("{}", serde_json::to_string_pretty(&cached)?);
    Ok(())
}

async fn config(ctx: &SiteContext, cmd: ConfigCommand) -> Result<()> {
    let outcome = match cmd {
        ConfigCommand::SetToken { token } => ctx.config_actions().update_github_token(&token).await?,
        ConfigCommand::DeleteToken => ctx.config_actions().delete_github_token().await?,
    };
    println!("Saved; config {}", outcome);
    Ok(())
}

async fn projects(ctx: &SiteContext, cmd: ProjectCommand) -> Result<()> {
    match cmd {
        ProjectCommand::Refresh { force } => {
            let projects = ctx.refresh_projects(force).await?;
            for project in &projects {
                println!("{:<30} {:<12} ★{:<5} {}", project.name, project.language, project.stars, project.url);
            }
            println!("{} project(s)", projects.len());
        }
        ProjectCommand::Clear => {
            ctx.projects().clear();
            println!("Project cache cleared");
        }
    }
    Ok(())
}
