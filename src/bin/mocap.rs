//! Motion-capture session server CLI.
//!
//! # Commands
//!
//! - `serve` - Serve a static scene to one client at a time
//! - `encode` - Encode a JSON envelope into a base64 wire frame
//! - `decode` - Decode a base64 wire frame into JSON
//! - `config` - Print the effective configuration

use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mocap::{
    codec::WireCodec,
    config::Config,
    protocol::{Envelope, StaticScene},
    server::{DisconnectBehavior, Server},
    VERSION,
};

#[derive(Parser)]
#[command(name = "mocap")]
#[command(version = VERSION)]
#[command(about = "Motion-capture session protocol server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept a client and run the session protocol
    Serve {
        /// Config file (default: <config dir>/mocap/config.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind to all interfaces (0.0.0.0)
        #[arg(long)]
        bind_all: bool,

        /// Camera offered to the client (repeatable, replaces the configured scene)
        #[arg(long = "camera")]
        cameras: Vec<String>,

        /// Exit after the first client disconnects
        #[arg(long)]
        once: bool,

        /// Send SessionStart as soon as a client connects
        #[arg(long)]
        initiate: bool,

        /// Log level when RUST_LOG is unset
        #[arg(long, default_value = "info")]
        log_level: String,

        /// Emit logs as JSON lines
        #[arg(long)]
        json_logs: bool,
    },

    /// Encode a JSON envelope into a base64 wire frame
    Encode {
        /// JSON input (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a base64 wire frame into JSON
    Decode {
        /// Frame input (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output as pretty-printed JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Config file (default: <config dir>/mocap/config.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            bind_all,
            cameras,
            once,
            initiate,
            log_level,
            json_logs,
        } => {
            init_logging(&log_level, json_logs);

            let mut config = load_config(config)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if bind_all {
                config.server.host = "0.0.0.0".to_string();
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if !cameras.is_empty() {
                config.scene.cameras = cameras;
            }
            if once {
                config.server.disconnect_behavior = DisconnectBehavior::Terminate;
            }
            if initiate {
                config.server.initiate_handshake = true;
            }

            cmd_serve(&config)
        },

        Commands::Encode {
            input,
            file,
            output,
        } => cmd_encode(input, file, output),

        Commands::Decode {
            input,
            file,
            output,
            pretty,
        } => cmd_decode(input, file, output, pretty),

        Commands::Config { config } => {
            let config = load_config(config)?;
            write_output(None, toml::to_string_pretty(&config)?.trim_end())
        },
    }
}

fn init_logging(log_level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// File (explicit or default location), then environment on top
fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let file = match path {
        Some(path) => Config::from_file(path)?,
        None => match Config::default_path().filter(|p| p.exists()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading default config file");
                Config::from_file(path)?
            },
            None => Config::default(),
        },
    };
    Ok(file.merge(Config::from_env()))
}

fn cmd_serve(config: &Config) -> anyhow::Result<()> {
    let server_config = config.server_config()?;
    let cameras = config.scene.cameras.clone();
    if cameras.is_empty() {
        tracing::warn!("scene has no cameras; clients will get an empty camera list");
    }
    tracing::info!(cameras = ?cameras, "serving static scene");

    let server = Server::new(server_config, move || StaticScene::new(cameras.clone()));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = server.bind().await?;
        server
            .serve(listener, async {
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            })
            .await?;
        Ok::<_, anyhow::Error>(())
    })
}

fn cmd_encode(
    input: Option<String>,
    file: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let content = read_input(input, file)?;
    let envelope = Envelope::from_json(content.trim())
        .map_err(|e| anyhow::anyhow!("Invalid envelope JSON: {e}"))?;

    let frame = WireCodec::new().encode_string(&envelope)?;
    write_output(output, &frame)
}

fn cmd_decode(
    input: Option<String>,
    file: Option<PathBuf>,
    output: Option<PathBuf>,
    pretty: bool,
) -> anyhow::Result<()> {
    let content = read_input(input, file)?;
    let envelope = WireCodec::new().decode_string(&content)?;

    let json = if pretty {
        envelope.to_json_pretty()?
    } else {
        envelope.to_json()?
    };
    write_output(output, &json)
}

// Helper functions

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        Ok(std::fs::read_to_string(path)?)
    } else if let Some(s) = input.filter(|s| s != "-") {
        Ok(s)
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}

fn write_output(output: Option<PathBuf>, content: &str) -> anyhow::Result<()> {
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}
