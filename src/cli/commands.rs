//! CLI command handlers.

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Table};
use console::style;

use crate::adapters::http::{serve, HttpConfig};
use crate::cli::{App, ChatCommands, StackCommands};
use crate::domain::models::Stack;
use crate::domain::ports::{ExecutionRepository, TraceRepository};

/// Run the scheduler and HTTP API until ctrl-c or SIGTERM.
pub async fn handle_serve(app: App) -> Result<()> {
    let scheduler = app.scheduler.clone();
    let scheduler_handle = scheduler.start();

    let http_state = app.http_state();
    let http_config = HttpConfig {
        host: app.config.server.host.clone(),
        port: app.config.server.port,
        enable_cors: app.config.server.enable_cors,
    };
    let http_handle = tokio::spawn(async move {
        if let Err(err) = serve(http_state, http_config).await {
            tracing::error!(error = %err, "http server exited");
        }
    });

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received");

    // Stop ticking, drain in-flight cycles, then tear down the API.
    scheduler.shutdown().await;
    scheduler_handle.abort();
    http_handle.abort();
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

pub async fn handle_stack(app: &App, command: StackCommands, json: bool) -> Result<()> {
    let admin = app.admin();
    match command {
        StackCommands::Create { participant_name } => {
            let stack = admin.create_stack(&participant_name).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stack)?);
            } else {
                println!(
                    "{} stack {} for {}",
                    style("Created").green(),
                    stack.id,
                    stack.participant_name
                );
            }
        }
        StackCommands::List => {
            let stacks = admin.list_stacks().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stacks)?);
            } else {
                print_stack_table(&stacks);
            }
        }
        StackCommands::Status { stack_id } => {
            let stack = admin.get_stack(stack_id).await?;
            let latest = app.executions.latest(stack_id).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "stack": stack,
                        "latest_execution": latest,
                    }))?
                );
            } else {
                print_stack_table(std::slice::from_ref(&stack));
                match latest {
                    Some(execution) => println!(
                        "Latest cycle: {} (decision: {})",
                        execution.status.as_str(),
                        execution
                            .decision
                            .map(|d| d.kind().to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    ),
                    None => println!("No cycles yet."),
                }
            }
        }
        StackCommands::Start { stack_id } => {
            admin.start_execution(stack_id).await?;
            println!("{} {}", style("Started").green(), stack_id);
        }
        StackCommands::Pause { stack_id } => {
            admin.pause_execution(stack_id).await?;
            println!("{} {}", style("Paused").yellow(), stack_id);
        }
        StackCommands::Resume { stack_id } => {
            admin.resume_execution(stack_id).await?;
            println!("{} {}", style("Resumed").green(), stack_id);
        }
        StackCommands::Stop { stack_id } => {
            admin.stop_execution(stack_id).await?;
            println!("{} {}", style("Stopped").red(), stack_id);
        }
        StackCommands::Delete { stack_id } => {
            admin.delete_stack(stack_id).await?;
            println!("{} {}", style("Deleted").red(), stack_id);
        }
        StackCommands::Traces { stack_id, limit } => {
            let traces = app.ctx.traces.recent(stack_id, limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&traces)?);
            } else {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL_CONDENSED);
                table.set_header(vec!["When", "Agent", "Action", "Result"]);
                for trace in &traces {
                    table.add_row(vec![
                        Cell::new(trace.created_at.format("%H:%M:%S")),
                        Cell::new(trace.agent_type.as_str()),
                        Cell::new(&trace.action),
                        Cell::new(&trace.result),
                    ]);
                }
                println!("{table}");
            }
        }
    }
    Ok(())
}

pub async fn handle_chat(app: &App, command: ChatCommands, json: bool) -> Result<()> {
    let admin = app.admin();
    match command {
        ChatCommands::Send {
            stack_id,
            sender,
            content,
        } => {
            let message = admin.send_user_message(stack_id, &sender, &content).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&message)?);
            } else {
                println!("{} message {}", style("Sent").green(), message.id);
            }
        }
        ChatCommands::History { stack_id, limit } => {
            let history = admin.chat_history(stack_id, limit).await?;
            if json {
                let entries: Vec<serde_json::Value> = history
                    .iter()
                    .map(|(message, reply)| {
                        serde_json::json!({
                            "sender": message.sender_name,
                            "content": message.content,
                            "sent_at": message.sent_at,
                            "reply": reply.as_ref().map(|r| r.content.clone()),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for (message, reply) in &history {
                    println!(
                        "{} {}: {}",
                        style(message.sent_at.format("%H:%M:%S")).dim(),
                        style(&message.sender_name).bold(),
                        message.content
                    );
                    if let Some(reply) = reply {
                        println!("    {} {}", style("team:").cyan(), reply.content);
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_stack_table(stacks: &[Stack]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        "ID",
        "Participant",
        "Phase",
        "Execution",
        "Cycles",
        "Last activity",
    ]);
    for stack in stacks {
        table.add_row(vec![
            Cell::new(stack.id),
            Cell::new(&stack.participant_name),
            Cell::new(stack.phase.as_str()),
            Cell::new(stack.execution_state.as_str()),
            Cell::new(stack.total_cycles),
            Cell::new(
                stack
                    .last_activity_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }
    println!("{table}");
}
