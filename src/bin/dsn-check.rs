use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;
use rpc_dispatch::config::{load_config, ClientConfig};

#[derive(Parser)]
#[command(name = "dsn-check")]
#[command(about = "Validate client connection strings and print the resolved configuration", long_about = None)]
struct Cli {
    /// Connection strings, e.g. grpc://example.com:443?timeout=5s
    dsn: Vec<String>,

    /// TOML file with a [clients] table of named connection strings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print single-line JSON
    #[arg(long)]
    compact: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    rpc_dispatch::observability::init_logging("warn");
    let cli = Cli::parse();

    if cli.dsn.is_empty() && cli.config.is_none() {
        eprintln!("nothing to check: pass connection strings or --config <FILE>");
        std::process::exit(2);
    }

    let mut resolved: BTreeMap<String, ClientConfig> = BTreeMap::new();
    let mut failed = false;

    if let Some(path) = &cli.config {
        match load_config(path) {
            Ok(clients) => resolved.extend(clients),
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                failed = true;
            }
        }
    }

    for dsn in &cli.dsn {
        match ClientConfig::parse(dsn) {
            Ok(config) => {
                resolved.insert(dsn.clone(), config);
            }
            Err(e) => {
                eprintln!("{}: {}", dsn, e);
                failed = true;
            }
        }
    }

    let out = if cli.compact {
        serde_json::to_string(&resolved)?
    } else {
        serde_json::to_string_pretty(&resolved)?
    };
    println!("{}", out);

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
