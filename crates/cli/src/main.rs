// FILE: crates/cli/src/main.rs

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use ledgerline_config::{Config, ConfigManager};

mod commands;
mod context;

use context::ClientContext;

fn build_cli() -> Command {
    Command::new("ledgerline")
        .version("0.1.0")
        .author("Ledgerline Developers")
        .about("Offline-first transaction ledger client")
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .value_name("PATH")
                .help("Path to the local queue database (overrides client.queue_database)")
                .global(true),
        )
        .arg(
            Arg::new("user")
                .short('u')
                .long("user")
                .value_name("USER_ID")
                .help("Account to act as (overrides client.user_id)")
                .global(true),
        )
        .subcommand(Command::new("init").about("Create the local database and warm the resource cache"))
        .subcommand(
            Command::new("add")
                .about("Record a new transaction")
                .arg(Arg::new("amount").required(true).allow_hyphen_values(true).value_name("AMOUNT").help("Signed amount, e.g. -12.50"))
                .arg(Arg::new("description").short('m').long("description").value_name("TEXT").help("Free-text description"))
                .arg(Arg::new("category").short('c').long("category").value_name("CATEGORY").help("Category label"))
                .arg(Arg::new("date").long("date").value_name("YYYY-MM-DD").help("Transaction date (defaults to today)")),
        )
        .subcommand(
            Command::new("edit")
                .about("Save a new version of an existing transaction")
                .arg(Arg::new("id").required(true).value_name("RECORD_ID").help("Record id"))
                .arg(Arg::new("amount").short('a').long("amount").allow_hyphen_values(true).value_name("AMOUNT").help("New amount"))
                .arg(Arg::new("description").short('m').long("description").value_name("TEXT").help("New description"))
                .arg(Arg::new("category").short('c').long("category").value_name("CATEGORY").help("New category"))
                .arg(Arg::new("date").long("date").value_name("YYYY-MM-DD").help("New transaction date")),
        )
        .subcommand(Command::new("list").about("List transactions stored on this device"))
        .subcommand(
            Command::new("pending")
                .about("Show mutations waiting for the server")
                .arg(Arg::new("json").long("json").help("Print as JSON").action(clap::ArgAction::SetTrue)),
        )
        .subcommand(Command::new("sync").about("Send every queued mutation now"))
        .subcommand(
            Command::new("resolve")
                .about("Resolve a conflicting transaction on the server")
                .arg(Arg::new("id").required(true).value_name("RECORD_ID").help("Record id"))
                .arg(
                    Arg::new("strategy")
                        .short('s')
                        .long("strategy")
                        .value_name("STRATEGY")
                        .help("Conflict strategy")
                        .value_parser(["server-wins", "client-wins", "merge"])
                        .default_value("merge"),
                ),
        )
        .subcommand(Command::new("watch").about("Stay running and sync whenever the connection allows"))
        .subcommand(
            Command::new("config")
                .about("Inspect or create the configuration file")
                .subcommand(Command::new("show").about("Print the effective configuration"))
                .subcommand(Command::new("init").about("Write a default configuration file")),
        )
}

fn load_config() -> Result<(ConfigManager, Config)> {
    let manager = ConfigManager::new().context("Failed to locate the config directory")?;
    let config = manager.load_with_env_overrides().unwrap_or_else(|e| {
        eprintln!("Config error: {}, using defaults", e);
        Config::default()
    });
    Ok((manager, config))
}

fn apply_overrides(config: &mut Config, matches: &ArgMatches) {
    if let Some(path) = matches.get_one::<String>("database") {
        config.client.queue_database = path.into();
    }
    if let Some(user) = matches.get_one::<String>("user") {
        config.client.user_id = user.clone();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let (manager, mut config) = load_config()?;
    apply_overrides(&mut config, &matches);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.app.log_level.to_string()),
    )
    .init();

    if let Some(("config", sub_matches)) = matches.subcommand() {
        return match sub_matches.subcommand() {
            Some(("init", _)) => commands::init_config(&manager),
            _ => commands::show_config(&manager, &config),
        };
    }
    if matches.subcommand().is_none() {
        build_cli().print_help()?;
        return Ok(());
    }

    let ctx = ClientContext::open(config)
        .await
        .context("Failed to open the local client")?;

    match matches.subcommand() {
        Some(("init", _)) => commands::init(&ctx).await,
        Some(("add", sub_matches)) => commands::add_record(&ctx, sub_matches).await,
        Some(("edit", sub_matches)) => commands::edit_record(&ctx, sub_matches).await,
        Some(("list", _)) => commands::list_records(&ctx).await,
        Some(("pending", sub_matches)) => commands::show_pending(&ctx, sub_matches).await,
        Some(("sync", _)) => commands::sync_now(&ctx).await,
        Some(("resolve", sub_matches)) => commands::resolve(&ctx, sub_matches).await,
        Some(("watch", _)) => commands::watch(&ctx).await,
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}
