//! finder-ctl — command-line interface for the finder daemon.

use anyhow::{Context, Result};

mod cmd;

use cmd::search::cmd_search;
use cmd::status::{cmd_neighbors, cmd_resources, cmd_shutdown, cmd_status};

const DEFAULT_PORT: u16 = 9101;

fn print_usage() {
    println!("Usage: finder-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  search <name> <version>   Find endpoints offering a resource");
    println!("  status                    Show node state and output queue depths");
    println!("  resources                 List locally cached compute endpoints");
    println!("  neighbors                 Show per-neighbor delivery counters");
    println!("  shutdown                  Stop the daemon");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["search", name, version] => cmd_search(port, name, version).await,
        ["status"] | [] => cmd_status(port).await,
        ["resources"] => cmd_resources(port).await,
        ["neighbors"] => cmd_neighbors(port).await,
        ["shutdown"] => cmd_shutdown(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            print_usage();
            std::process::exit(1);
        }
    }
}
