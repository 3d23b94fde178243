use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chatty_channels::{CartelChatApi, DiscordWebhook};
use chatty_config::{find_config_path, Config, ConfigProvider, JsonFileProvider};
use chatty_core::{Channel, RelayCredentials, RelayEngine, RelayOptions, StatusUpdate};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(
    name = "chatty",
    about = "Relay game chat channels to Discord webhooks",
    version
)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay chat until interrupted
    Run {
        /// Channel to start (global, trade, cartel). Repeatable.
        /// Defaults to every channel with a webhook.
        #[arg(short = 'C', long = "channel")]
        channels: Vec<String>,
    },
    /// Show configuration and relay settings
    Status,
    /// Edit the stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set the chat API key
    SetKey {
        key: String,
    },
    /// Set (or clear, with an empty URL) a channel's webhook
    SetWebhook {
        channel: String,
        url: String,
    },
    /// Print the stored configuration with the key masked
    Show,
}

/// A line typed at the `run` prompt.
#[derive(Debug, PartialEq, Eq)]
enum ControlCommand {
    Start(Channel),
    Stop(Channel),
    Status,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let cli = Cli::parse();
    let provider = JsonFileProvider::new(cli.config.unwrap_or_else(find_config_path));

    match cli.command {
        Commands::Run { channels } => run_relay(&provider, &channels).await,
        Commands::Status => run_status(&provider),
        Commands::Config { action } => run_config(&provider, action),
    }
}

fn build_engine(config: &Config) -> Result<RelayEngine> {
    let timeout = config.relay.http_timeout_secs.map(Duration::from_secs);
    let source = Arc::new(CartelChatApi::new(&config.relay.api_base, timeout)?);
    let sink = Arc::new(DiscordWebhook::new(timeout)?);
    Ok(RelayEngine::new(
        source,
        sink,
        RelayOptions::from(&config.relay),
    ))
}

/// Channels named on the command line, or every channel with a webhook.
fn initial_channels(names: &[String], creds: &RelayCredentials) -> Result<Vec<Channel>> {
    if names.is_empty() {
        return Ok(Channel::ALL
            .into_iter()
            .filter(|&c| creds.webhooks.get(c).is_some())
            .collect());
    }
    names.iter().map(|n| n.parse()).collect()
}

async fn run_relay(provider: &JsonFileProvider, names: &[String]) -> Result<()> {
    let config = provider.load()?;
    let creds = RelayCredentials::from(&config);
    let channels = initial_channels(names, &creds)?;
    if channels.is_empty() {
        bail!("No channel has a webhook configured. Use `chatty config set-webhook <channel> <url>`.");
    }

    let engine = build_engine(&config)?;
    engine.configure(creds).await;

    let updates = engine.subscribe();
    tokio::spawn(print_status_updates(updates));

    for channel in channels {
        start_channel(&engine, channel).await;
    }
    println!("Type a channel name to toggle it, `stop <channel>`, `status` or `quit`.");

    let exit = control_loop(&engine, BufReader::new(tokio::io::stdin())).await;
    tracing::info!("Shutting down ({exit:?})...");
    engine.shutdown();

    // Re-read before writing so edits made by `chatty config` while we ran survive.
    provider.update(|_| {})?;
    tracing::info!("Configuration saved to {}", provider.path().display());
    Ok(())
}

/// Why the control loop returned.
#[derive(Debug, PartialEq, Eq)]
enum ControlExit {
    Quit,
    Interrupted,
}

/// Read control lines until `quit` or Ctrl-C. Never fails: unreadable input is
/// reported and the relay keeps running.
async fn control_loop<R>(engine: &RelayEngine, reader: R) -> ControlExit
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.split(b'\n');
    let mut input_open = true;
    loop {
        tokio::select! {
            line = lines.next_segment(), if input_open => {
                match line {
                    Ok(Some(raw)) => match decode_control(&raw) {
                        Ok(Some(ControlCommand::Quit)) => return ControlExit::Quit,
                        Ok(Some(cmd)) => apply_control(engine, cmd).await,
                        Ok(None) => {}
                        Err(e) => eprintln!("{e}"),
                    },
                    // Detached from a terminal: keep relaying until Ctrl-C.
                    Ok(None) => input_open = false,
                    Err(e) => {
                        tracing::warn!("Control input unreadable, ignoring it from now on: {e}");
                        input_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => return ControlExit::Interrupted,
        }
    }
}

async fn start_channel(engine: &RelayEngine, channel: Channel) {
    if let Err(e) = engine.start(channel).await {
        eprintln!("Input error: {e}");
    }
}

async fn apply_control(engine: &RelayEngine, cmd: ControlCommand) {
    match cmd {
        ControlCommand::Start(channel) => start_channel(engine, channel).await,
        ControlCommand::Stop(channel) => {
            engine.stop(channel);
        }
        ControlCommand::Status => {
            for (channel, status) in engine.statuses() {
                println!(
                    "  {channel:<7} {status:<8} last id {}",
                    engine.last_seen_id(channel)
                );
            }
            println!("  {} message(s) relayed so far", engine.sent_count());
        }
        ControlCommand::Quit => {}
    }
}

/// Decode one raw input line. Bytes that are not UTF-8 become U+FFFD and
/// therefore an unrecognized command, not an error that ends the session.
fn decode_control(raw: &[u8]) -> Result<Option<ControlCommand>> {
    parse_control(&String::from_utf8_lossy(raw))
}

fn parse_control(line: &str) -> Result<Option<ControlCommand>> {
    let lowered = line.to_ascii_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    let cmd = match words.as_slice() {
        [] => return Ok(None),
        ["quit" | "exit"] => ControlCommand::Quit,
        ["status"] => ControlCommand::Status,
        ["stop", name] => ControlCommand::Stop(name.parse()?),
        ["start", name] | [name] => ControlCommand::Start(name.parse()?),
        _ => bail!("Unrecognized command: {}", line.trim()),
    };
    Ok(Some(cmd))
}

async fn print_status_updates(mut updates: broadcast::Receiver<StatusUpdate>) {
    loop {
        match updates.recv().await {
            Ok(update) => println!("{}: Status: {}", update.channel, update.status),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0 => "(not set)".to_string(),
        n if n <= 8 => "*".repeat(n),
        n => format!("****{}", chars[n - 4..].iter().collect::<String>()),
    }
}

fn run_status(provider: &JsonFileProvider) -> Result<()> {
    let path = provider.path();
    let config = provider.load()?;
    let creds = RelayCredentials::from(&config);

    println!("Config: {}", path.display());
    if !path.exists() {
        println!("  (file does not exist yet, showing defaults)");
    }
    println!("API key: {}", mask_secret(&creds.api_key));
    println!();
    println!("Webhooks:");
    for channel in Channel::ALL {
        println!(
            "  {channel:<7} {}",
            creds.webhooks.get(channel).unwrap_or("(not set)")
        );
    }
    println!();

    let relay = &config.relay;
    println!("Relay:");
    println!("  API base:          {}", relay.api_base);
    println!("  Poll interval:     {} ms", relay.poll_interval_ms);
    println!("  Catch-up count:    {}", relay.catch_up_count);
    println!(
        "  HTTP timeout:      {}",
        relay
            .http_timeout_secs
            .map(|s| format!("{s}s"))
            .unwrap_or_else(|| "none".to_string())
    );
    println!(
        "  Max backoff:       {}",
        relay
            .max_backoff_secs
            .map(|s| format!("{s}s"))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("  Start mode:        {:?}", relay.start_mode);
    println!("  Dedup scope:       {:?}", relay.dedup_scope);
    println!("  Delivery failure:  {:?}", relay.on_delivery_failure);
    Ok(())
}

fn run_config(provider: &JsonFileProvider, action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::SetKey { key } => {
            provider.update(|config| config.api_key = key.trim().to_string())?;
            println!("API key saved to {}", provider.path().display());
        }
        ConfigCommands::SetWebhook { channel, url } => {
            let channel: Channel = channel.parse()?;
            let url = url.trim().to_string();
            if !url.is_empty() {
                url::Url::parse(&url).with_context(|| format!("invalid webhook URL '{url}'"))?;
            }
            provider.update(|config| match channel {
                Channel::Global => config.webhooks.global = url,
                Channel::Trade => config.webhooks.trade = url,
                Channel::Cartel => config.webhooks.cartel = url,
            })?;
            println!("{channel} webhook saved to {}", provider.path().display());
        }
        ConfigCommands::Show => {
            let mut config = provider.load()?;
            config.api_key = mask_secret(&config.api_key);
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatty_core::Webhooks;

    #[test]
    fn control_lines_parse() {
        assert_eq!(
            parse_control("trade").unwrap(),
            Some(ControlCommand::Start(Channel::Trade))
        );
        assert_eq!(
            parse_control("  stop Cartel ").unwrap(),
            Some(ControlCommand::Stop(Channel::Cartel))
        );
        assert_eq!(
            parse_control("start global").unwrap(),
            Some(ControlCommand::Start(Channel::Global))
        );
        assert_eq!(parse_control("quit").unwrap(), Some(ControlCommand::Quit));
        assert_eq!(parse_control("status").unwrap(), Some(ControlCommand::Status));
        assert_eq!(parse_control("   ").unwrap(), None);
        assert!(parse_control("stop").is_err());
        assert!(parse_control("faction").is_err());
        assert!(parse_control("stop trade now").is_err());
    }

    #[test]
    fn default_channels_are_those_with_webhooks() {
        let creds = RelayCredentials::new(
            "k",
            Webhooks::default().with(Channel::Cartel, "https://example.com/c"),
        );
        assert_eq!(initial_channels(&[], &creds).unwrap(), vec![Channel::Cartel]);
        assert_eq!(
            initial_channels(&["trade".to_string()], &creds).unwrap(),
            vec![Channel::Trade]
        );
        assert!(initial_channels(&["nope".to_string()], &creds).is_err());
    }

    #[test]
    fn non_utf8_line_is_an_ordinary_bad_command() {
        assert!(decode_control(b"\xff").is_err());
        assert!(decode_control(b"sta\xfftus").is_err());
        assert_eq!(
            decode_control(b"trade\r").unwrap(),
            Some(ControlCommand::Start(Channel::Trade))
        );
    }

    fn idle_engine() -> RelayEngine {
        let source = Arc::new(CartelChatApi::new("http://127.0.0.1:1", None).unwrap());
        let sink = Arc::new(DiscordWebhook::new(None).unwrap());
        RelayEngine::new(source, sink, RelayOptions::default())
    }

    #[tokio::test]
    async fn control_loop_survives_invalid_utf8() {
        let engine = idle_engine();
        let input: &[u8] = b"status\n\xff\xfe\nstop trade\nquit\n";

        let exit = control_loop(&engine, input).await;

        assert_eq!(exit, ControlExit::Quit);
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask_secret(""), "(not set)");
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(mask_secret("abcdefghijkl"), "****ijkl");
    }
}
