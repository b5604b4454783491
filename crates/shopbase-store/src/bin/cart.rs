//! # Cart Tool
//!
//! Inspects and edits the local file-backed cart.
//!
//! ## Usage
//! ```bash
//! # Show lines and totals
//! cargo run -p shopbase-store --bin cart -- show
//!
//! # Add two of a variant at $9.99
//! cargo run -p shopbase-store --bin cart -- add v1 9.99 2 --name "Blue Mug"
//!
//! # Change, remove, empty
//! cargo run -p shopbase-store --bin cart -- set v1 5
//! cargo run -p shopbase-store --bin cart -- remove v1
//! cargo run -p shopbase-store --bin cart -- clear
//!
//! # Use a specific storage directory
//! cargo run -p shopbase-store --bin cart -- --dir ./data show --json
//! ```

use std::env;
use std::path::PathBuf;

use shopbase_core::LineCandidate;
use shopbase_store::logging::init_tracing;
use shopbase_store::{open_store, CartStore, CurrencyConfig, StoreConfig};

enum Command {
    Show { json: bool },
    Add { line_id: String, price: String, quantity: i64, name: Option<String> },
    Set { line_id: String, quantity: i64 },
    Remove { line_id: String },
    Clear,
}

fn print_help() {
    println!("ShopBase Cart Tool");
    println!();
    println!("Usage: cart [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  show [--json]                          Show lines and totals");
    println!("  add <LINE-ID> <PRICE> [QTY] [--name N] Add QTY (default 1) of a line");
    println!("  set <LINE-ID> <QTY>                    Set a line's quantity (0 removes)");
    println!("  remove <LINE-ID>                       Remove a line");
    println!("  clear                                  Remove every line");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>   Config file (default: platform config dir)");
    println!("  -d, --dir <PATH>      Storage directory (overrides config)");
    println!("  -h, --help            Show this help message");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();

    let mut config_path: Option<PathBuf> = None;
    let mut dir: Option<PathBuf> = None;
    let mut name: Option<String> = None;
    let mut json = false;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--dir" | "-d" => {
                if i + 1 < args.len() {
                    dir = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--name" | "-n" => {
                if i + 1 < args.len() {
                    name = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--json" => json = true,
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let command = match parse_command(&positional, name, json) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("error: {}", message);
            eprintln!();
            print_help();
            std::process::exit(2);
        }
    };

    let mut config = StoreConfig::load(config_path)?;
    if let Some(dir) = dir {
        config.storage.dir = Some(dir);
    }

    let opened = open_store(&config)?;
    let result = run(&opened.store, command, &config.currency);

    // Let queued saves land before exiting, even after a failed command
    opened.close().await?;
    result
}

fn parse_command(
    positional: &[String],
    name: Option<String>,
    json: bool,
) -> Result<Command, String> {
    let arg = |index: usize, what: &str| {
        positional
            .get(index)
            .cloned()
            .ok_or_else(|| format!("missing {}", what))
    };
    let quantity = |raw: &str| {
        raw.parse::<i64>()
            .map_err(|_| format!("quantity must be a whole number, got '{}'", raw))
    };

    match positional.first().map(String::as_str) {
        None | Some("show") => Ok(Command::Show { json }),
        Some("add") => Ok(Command::Add {
            line_id: arg(1, "<LINE-ID>")?,
            price: arg(2, "<PRICE>")?,
            quantity: match positional.get(3) {
                Some(raw) => quantity(raw)?,
                None => 1,
            },
            name,
        }),
        Some("set") => Ok(Command::Set {
            line_id: arg(1, "<LINE-ID>")?,
            quantity: quantity(&arg(2, "<QTY>")?)?,
        }),
        Some("remove") => Ok(Command::Remove {
            line_id: arg(1, "<LINE-ID>")?,
        }),
        Some("clear") => Ok(Command::Clear),
        Some(other) => Err(format!("unknown command '{}'", other)),
    }
}

fn run(
    store: &CartStore,
    command: Command,
    currency: &CurrencyConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Show { json: true } => {
            let body = serde_json::json!({
                "lines": store.lines(),
                "totals": store.totals(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
            return Ok(());
        }
        Command::Show { json: false } => {}
        Command::Add {
            line_id,
            price,
            quantity,
            name,
        } => {
            let price = currency.parse(&price)?;
            let label = name.unwrap_or_else(|| line_id.clone());
            let candidate = LineCandidate::new(line_id.clone(), price.cents())
                .product(line_id.clone(), label, line_id);
            store.add_line(candidate, quantity)?;
        }
        Command::Set { line_id, quantity } => {
            if store.line(&line_id).is_none() {
                println!("⚠ No line '{}' in the cart", line_id);
            }
            store.set_quantity(&line_id, quantity)?;
        }
        Command::Remove { line_id } => {
            if !store.remove_line(&line_id) {
                println!("⚠ No line '{}' in the cart", line_id);
            }
        }
        Command::Clear => {
            store.clear();
        }
    }

    print_cart(store, currency);
    Ok(())
}

fn print_cart(store: &CartStore, currency: &CurrencyConfig) {
    let lines = store.lines();

    println!("🛒 Cart");
    println!("================================");

    if lines.is_empty() {
        println!("  (empty)");
    }

    for line in &lines {
        println!(
            "  {:<20} {:>4} x {:>10} = {:>10}",
            line.product_name,
            line.quantity,
            currency.format(line.unit_price_cents),
            currency.format(line.line_total().cents()),
        );
    }

    let totals = store.totals();
    println!("--------------------------------");
    println!(
        "  {} line(s), {} item(s), subtotal {}",
        totals.line_count,
        totals.total_item_count,
        currency.format(totals.subtotal_cents)
    );
}
