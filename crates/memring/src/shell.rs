//! Interactive command loop over a [`Directory`].

use memring_directory::{Directory, DirectoryError};
use memring_types::NodeAddr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

const MENU: &str = "1. get <key>\n\
                    2. set <key> <value>\n\
                    3. add <node_ip> <node_port>\n\
                    4. remove <node_ip> <node_port>\n\
                    5. status\n\
                    6. quit\n\
                    Enter a command: ";

/// One parsed shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { key: String },
    Set { key: String, value: String },
    Add(NodeAddr),
    Remove(NodeAddr),
    Status,
    Quit,
}

/// Why a shell line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Incorrect Command")]
    Unknown,
    #[error("Incorrect Command / Params")]
    BadParams,
}

impl Command {
    /// Parse one line of input.
    ///
    /// Words are separated by single spaces; a value cannot contain one.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let words: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(' ').collect();
        match words.as_slice() {
            ["quit"] => Ok(Self::Quit),
            ["status"] => Ok(Self::Status),
            ["get", key] if !key.is_empty() => Ok(Self::Get {
                key: key.to_string(),
            }),
            ["set", key, value] if !key.is_empty() => Ok(Self::Set {
                key: key.to_string(),
                value: value.to_string(),
            }),
            ["add", host, port] => node(host, port).map(Self::Add),
            ["remove", host, port] => node(host, port).map(Self::Remove),
            ["get" | "set" | "add" | "remove" | "status" | "quit", ..] => {
                Err(CommandError::BadParams)
            }
            _ => Err(CommandError::Unknown),
        }
    }
}

fn node(host: &str, port: &str) -> Result<NodeAddr, CommandError> {
    let port: u16 = port.parse().map_err(|_| CommandError::BadParams)?;
    if host.is_empty() {
        return Err(CommandError::BadParams);
    }
    Ok(NodeAddr::new(host, port))
}

/// Run the shell until `quit` or end of input.
pub async fn run<R, W>(directory: &Directory, input: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        output.write_all(MENU.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let reply = match Command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => execute(directory, command).await,
            Err(e) => e.to_string(),
        };
        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }
    output.flush().await?;
    Ok(())
}

/// Run one command and render the line to print.
pub async fn execute(directory: &Directory, command: Command) -> String {
    let result = match command {
        Command::Get { key } => directory.get(&key).await.map(|value| match value {
            Some(value) => format!("Key: {key}, Value: {}", String::from_utf8_lossy(&value)),
            None => "Key Not Found".to_string(),
        }),
        Command::Set { key, value } => directory
            .set(&key, value)
            .await
            .map(|_| "Done!".to_string()),
        Command::Add(addr) => directory
            .add_node(addr)
            .await
            .map(|_| "Added Node".to_string()),
        Command::Remove(addr) => match directory.remove_node(&addr).await {
            Err(DirectoryError::UnknownNode(_)) => Ok("Node not found".to_string()),
            other => other.map(|_| "Removed Node".to_string()),
        },
        Command::Status => Ok(render_status(directory).await),
        Command::Quit => Ok(String::new()),
    };

    result.unwrap_or_else(|e| {
        warn!(error = %e, "command failed");
        format!("Error: {e}")
    })
}

/// One line per node: address, ring positions, replicas, tracked records.
pub async fn render_status(directory: &Directory) -> String {
    let status = directory.status().await;
    if status.is_empty() {
        return "No nodes".to_string();
    }
    status
        .iter()
        .map(|node| {
            let replicas: Vec<String> = node.replicas.iter().map(ToString::to_string).collect();
            format!(
                "{} positions={:?} replicas=[{}] keys={}",
                node.addr,
                node.positions,
                replicas.join(", "),
                node.tracked
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
