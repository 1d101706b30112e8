use super::context::CliContext;
use anyhow::{Context, Result};
use profcat_core::SessionsManager;
use profcat_core::catalog::CatalogEntry;
use profcat_core::session::SessionType;
use std::path::PathBuf;

pub async fn list(ctx: &CliContext, json: bool) -> Result<()> {
    let (_transport, manager) = ctx.open_catalog().await?;
    let rows = manager.ordered_artifacts().await;

    if json {
        let output = serde_json::to_string_pretty(&rows).context("Failed to serialize catalog")?;
        println!("{}", output);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No sessions.");
        return Ok(());
    }
    print_rows(&manager, &rows).await;
    Ok(())
}

pub async fn import(ctx: &CliContext, files: &[PathBuf]) -> Result<()> {
    let (_transport, manager) = ctx.open_catalog().await?;

    let mut failed = 0;
    for file in files {
        if manager.import_session_from_file(file).await {
            println!("✅ Imported {}", file.display());
        } else {
            println!("❌ Could not import {}", file.display());
            failed += 1;
        }
    }

    manager.reconcile().await;
    if let Some(metadata) = manager.selected_session_metadata().await {
        println!("Selected: {} [{}]", metadata.session_name, metadata.session_id);
    }

    if failed > 0 {
        anyhow::bail!("{} of {} files failed to import", failed, files.len());
    }
    Ok(())
}

pub async fn delete(ctx: &CliContext, session_id: i64) -> Result<()> {
    let (transport, manager) = ctx.open_catalog().await?;
    let item = manager
        .session_item(session_id)
        .await
        .with_context(|| format!("No session with id {}", session_id))?;

    manager.delete_session(item.session()).await;
    transport.flush().await;
    println!("🗑  Deleted {} [{}]", item.name(), session_id);
    Ok(())
}

/// Prints rows as an indented tree, marking the selection.
pub async fn print_rows(manager: &SessionsManager, rows: &[CatalogEntry]) {
    let selected = manager.selected_session().await;
    let selected_row = manager.selected_artifact().await;

    for row in rows {
        let marker = if selected_row == Some(row.identity())
            || (row.is_session() && row.session().session_id == selected.session_id && selected_row.is_none())
        {
            "*"
        } else {
            " "
        };
        match row {
            CatalogEntry::Session {
                session,
                metadata,
                summary,
            } => {
                let state = if session.is_alive() {
                    "live".to_string()
                } else {
                    format_duration(session.end_timestamp - session.start_timestamp)
                };
                let kind = match (metadata.session_type, summary) {
                    (SessionType::Full, _) => "session".to_string(),
                    (_, Some(summary)) => format!("imported {}", summary.name),
                    (_, None) => "imported".to_string(),
                };
                println!(
                    "{} [{}] {}  ({}, {})",
                    marker, session.session_id, metadata.session_name, kind, state
                );
            }
            CatalogEntry::Artifact { artifact, .. } => {
                let state = if artifact.is_ongoing { " (recording)" } else { "" };
                println!(
                    "{}     {} @ +{}{}",
                    marker,
                    artifact.name,
                    format_duration(artifact.timestamp_ns),
                    state
                );
            }
        }
    }
}

fn format_duration(ns: i64) -> String {
    let ms = ns / 1_000_000;
    if ms >= 1_000 {
        format!("{}.{:03}s", ms / 1_000, ms % 1_000)
    } else {
        format!("{}ms", ms)
    }
}
