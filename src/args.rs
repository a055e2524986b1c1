use clap::{command, Parser};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = r###"
Gaia Relay is a streaming proxy for an OpenAI-compatible Gaia node. It fronts the education platform's assistant features:
- Relay: chat completion requests are forwarded to the configured Gaia endpoint with the node credential attached.
- Streaming: upstream server-sent-event streams are copied to the caller byte for byte.
- Diagnostics: every failure is classified and kept in a bounded in-memory history.
"###
)]
pub struct Args {
    #[command(subcommand)]
    pub subcmd: Option<SubCommands>,
}

#[derive(Parser, Debug)]
pub enum SubCommands {
    /// Start the relay server. This is the default when no subcommand is given.
    Start(StartSubCommand),
    /// Print the resolved configuration and where it is loaded from.
    Config(ConfigSubCommand),
    /// Send one prompt through the streaming relay and print the reply.
    Chat(ChatSubCommand),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Start the Gaia relay", long_about = None)]
pub struct StartSubCommand {}

#[derive(Parser, Debug)]
#[command(author, version, about = "Show configuration values", long_about = None)]
pub struct ConfigSubCommand {}

#[derive(Parser, Debug)]
#[command(author, version, about = "Send a single chat prompt", long_about = None)]
pub struct ChatSubCommand {
    /// The user prompt to send.
    pub prompt: String,

    /// Model to request. Defaults to the configured default model.
    #[arg(short, long)]
    pub model: Option<String>,
}
