use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::UnixStream;

use yosai_daemon::protocol::{read_frame, write_frame, Message};

/// Responses larger than this are refused.
const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "yosai-cli")]
#[command(about = "Send one request to the Yosai daemon", long_about = None)]
struct Cli {
    #[arg(short, long, env = "YOSAI_SOCKET", default_value = "/tmp/yosaid.sock")]
    socket: PathBuf,

    /// JSON request body.
    #[arg(short, long)]
    body: Option<String>,

    /// Target, e.g. `config` or `keyring`.
    target: String,

    /// Method on the target, e.g. `show`.
    method: String,
}

async fn exchange(cli: &Cli) -> Result<Message, Box<dyn std::error::Error>> {
    let body = match &cli.body {
        Some(raw) => {
            // Validate locally so typos fail before touching the daemon.
            let value: serde_json::Value = serde_json::from_str(raw)?;
            serde_json::to_vec(&value)?
        }
        None => Vec::new(),
    };
    let request = Message::request(cli.target.as_str(), cli.method.as_str(), body);

    let mut stream = UnixStream::connect(&cli.socket).await?;
    write_frame(&mut stream, &request).await?;
    Ok(read_frame(&mut stream, MAX_RESPONSE_BYTES).await?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let response = match exchange(&cli).await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    eprintln!("{}", response.status.as_str());
    if !response.body.is_empty() {
        match serde_json::from_slice::<serde_json::Value>(&response.body) {
            Ok(value) => match serde_json::to_string_pretty(&value) {
                Ok(pretty) => println!("{pretty}"),
                Err(_) => println!("{}", String::from_utf8_lossy(&response.body)),
            },
            Err(_) => println!("{}", String::from_utf8_lossy(&response.body)),
        }
    }

    if response.status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
