use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "toolrelay",
    version,
    about = "Chat with a language model that can call local and MCP tools"
)]
pub struct Cli {
    /// Configuration file, `config/client.toml` when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Model provider id, overriding `default_provider`
    #[arg(long)]
    pub provider: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub system: Option<String>,
    /// Session id to use instead of a generated one
    #[arg(long)]
    pub session: Option<String>,
    /// Extra MCP server reachable over HTTP. Registration failure is fatal.
    #[arg(long)]
    pub mcp_url: Option<String>,
    /// Disable log output
    #[arg(long, short)]
    pub quiet: bool,
}
