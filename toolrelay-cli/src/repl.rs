use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use toolrelay_core::agent::AgentStep;
use toolrelay_core::model::ModelProvider;
use toolrelay_core::{AgentError, Conversation};
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ReplError {
    #[error("stdin/stdout I/O error: {0}")]
    Io(#[from] std::io::Error),
}

enum LoopControl {
    Continue,
    Exit,
}

#[derive(Debug, PartialEq)]
enum Prompt {
    Line(String),
    Eof,
    Interrupted,
}

/// Wait for the next input line or for `interrupt`, whichever comes first.
async fn read_prompt<R, F>(lines: &mut Lines<R>, interrupt: F) -> io::Result<Prompt>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::select! {
        line = lines.next_line() => Ok(line?.map_or(Prompt::Eof, Prompt::Line)),
        () = interrupt => Ok(Prompt::Interrupted),
    }
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

pub async fn run<P>(mut conversation: Conversation<P>) -> Result<(), ReplError>
where
    P: ModelProvider + 'static,
{
    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut last_steps: Vec<AgentStep> = Vec::new();

    write_line(&mut stdout, "toolrelay interactive session").await?;
    print_help(&mut stdout).await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        // once a ctrl_c listener exists SIGINT no longer ends the process
        let line = match read_prompt(&mut lines, ctrl_c()).await? {
            Prompt::Line(line) => line,
            Prompt::Eof | Prompt::Interrupted => {
                write_line(&mut stdout, "").await?;
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match handle_command(input, &mut conversation, &last_steps, &mut stdout).await? {
                LoopControl::Continue => continue,
                LoopControl::Exit => break,
            }
        }

        info!(session = conversation.id(), "Processing interactive request");
        match conversation.run_turn_until(input, ctrl_c()).await {
            Ok(outcome) => {
                for step in &outcome.steps {
                    let marker = if step.success { "ok" } else { "error" };
                    write_line(&mut stdout, &format!("  [{}: {marker}]", step.tool)).await?;
                }
                write_line(&mut stdout, &outcome.response).await?;
                last_steps = outcome.steps;
            }
            Err(AgentError::Cancelled) => {
                write_line(&mut stdout, &AgentError::Cancelled.user_message()).await?;
            }
            Err(err) => {
                write_line(&mut stdout, &format!("Error: {}", err.user_message())).await?;
            }
        }
    }

    stdout.flush().await?;
    Ok(())
}

async fn handle_command<P: ModelProvider>(
    input: &str,
    conversation: &mut Conversation<P>,
    last_steps: &[AgentStep],
    stdout: &mut io::Stdout,
) -> Result<LoopControl, ReplError> {
    let name = input
        .trim_start_matches('/')
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    debug!(command = %name, "Processing REPL command");

    match name.as_str() {
        "exit" | "quit" => return Ok(LoopControl::Exit),
        "help" | "?" => print_help(stdout).await?,
        "clear" | "reset" => {
            conversation.clear();
            write_line(stdout, "History cleared. Starting a new session.").await?;
        }
        "status" => {
            let status = conversation.status();
            write_line(stdout, &format!("Session:   {}", status.session_id)).await?;
            write_line(stdout, &format!("Provider:  {}", status.provider)).await?;
            write_line(stdout, &format!("Model:     {}", status.model)).await?;
            write_line(stdout, &format!("Turns:     {}", status.turns)).await?;
            write_line(
                stdout,
                &format!("Tools:     {} from {} providers", status.tools, status.providers),
            )
            .await?;
        }
        "tools" => {
            let registry = Arc::clone(conversation.registry());
            if registry.is_empty() {
                write_line(stdout, "No tools registered.").await?;
            }
            for tool in registry.tools() {
                let description = tool.descriptor.description.as_deref().unwrap_or("");
                write_line(
                    stdout,
                    &format!("  {} ({}) {description}", tool.name(), tool.provider_id()),
                )
                .await?;
            }
        }
        "reload" => {
            let count = conversation.reload_tools().await;
            write_line(stdout, &format!("Reloaded {count} tools.")).await?;
        }
        "steps" => {
            if last_steps.is_empty() {
                write_line(stdout, "No tool steps in the last turn.").await?;
            }
            for step in last_steps {
                write_line(
                    stdout,
                    &format!(
                        "  {} {} -> {} ({})",
                        step.tool,
                        step.input,
                        step.output,
                        if step.success { "ok" } else { "error" }
                    ),
                )
                .await?;
            }
        }
        other => {
            write_line(stdout, &format!("Unknown command '/{other}'. Type /help.")).await?;
        }
    }
    Ok(LoopControl::Continue)
}

async fn print_help(stdout: &mut io::Stdout) -> io::Result<()> {
    write_line(stdout, "Commands:").await?;
    write_line(stdout, "  /help     Show this help").await?;
    write_line(stdout, "  /status   Session, model and tool counts").await?;
    write_line(stdout, "  /tools    List registered tools").await?;
    write_line(stdout, "  /steps    Tool calls of the last turn").await?;
    write_line(stdout, "  /reload   Re-list tools from every provider").await?;
    write_line(stdout, "  /clear    Forget the history").await?;
    write_line(stdout, "  /exit     Leave").await?;
    write_line(stdout, "Ctrl-C cancels a running turn, or leaves at the prompt.").await
}

async fn write_line(stdout: &mut io::Stdout, line: &str) -> io::Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
