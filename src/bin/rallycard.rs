use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;

use rallycard::{
    BroadcastHub, CardInfo, CardStore, CheckpointField, Clock, LocalClock, LogNotifier, Millis,
    NotificationWorker, Notifier, PageContext, RallyConfig, UNSET, calculate_countdown, format_time,
    logging, parse_time,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum NotifierKind {
    Log,
    Desktop,
}

#[derive(Parser, Debug)]
#[command(name = "rallycard", version, about = "Rally time card with checkpoint countdown")]
struct Cli {
    #[arg(long, default_value = "rallycard.yaml")]
    config: PathBuf,

    /// Card file, overrides `card_path` from the config
    #[arg(long)]
    card: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the card and the next deadline
    Show,
    /// Set a time field; durations are entered as HH:MM[:SS] too
    Set {
        number: u32,
        field: CheckpointField,
        /// HH:MM[:SS[.fff]], or `unset`
        value: String,
    },
    /// Append a checkpoint
    Add {
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Remove a checkpoint and renumber the rest
    Remove { number: u32 },
    /// Rename a checkpoint
    Rename { number: u32, name: String },
    /// Set a card metadata entry such as `name` or `crew`
    Info { key: String, value: String },
    /// Run the worker and print the live countdown until interrupted
    Watch {
        #[arg(long, value_enum, default_value_t = NotifierKind::Log)]
        notifier: NotifierKind,
    },
    /// Fire a test notification through the worker
    NotifyTest {
        #[arg(default_value = "Notifications are working")]
        body: String,
        #[arg(long, value_enum, default_value_t = NotifierKind::Log)]
        notifier: NotifierKind,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = RallyConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    logging::init(&config.log_filter);

    let store = CardStore::new(cli.card.clone().unwrap_or_else(|| config.card_path.clone()));
    let hub = BroadcastHub::named(&config.channel_name);
    let page = PageContext::open(&hub, Some(store));

    match cli.command {
        Command::Show => show(&page, &LocalClock),
        Command::Set { number, field, value } => {
            let value = parse_value(&value)?;
            page.edit(number, field, value)
                .with_context(|| format!("failed to set {field} of checkpoint {number}"))?;
            show(&page, &LocalClock);
        }
        Command::Add { name } => {
            let number = page.add_checkpoint(&name)?;
            println!("added checkpoint {number}");
        }
        Command::Remove { number } => {
            page.remove_checkpoint(number)
                .with_context(|| format!("failed to remove checkpoint {number}"))?;
            show(&page, &LocalClock);
        }
        Command::Rename { number, name } => {
            page.rename(number, &name)
                .with_context(|| format!("failed to rename checkpoint {number}"))?;
        }
        Command::Info { key, value } => {
            let mut info: CardInfo = page.card().info;
            info.insert(key, value);
            page.publish_card_info(info)?;
        }
        Command::Watch { notifier } => watch(&hub, &page, &config, build_notifier(notifier)?).await?,
        Command::NotifyTest { body, notifier } => {
            let worker = NotificationWorker::spawn(
                &hub,
                build_notifier(notifier)?,
                Arc::new(LocalClock),
                config.scheduler.clone(),
            );
            page.request_test_notification(&body)?;
            tokio::time::sleep(Duration::from_millis(500)).await;
            worker.shutdown().await;
        }
    }
    Ok(())
}

async fn watch(
    hub: &BroadcastHub,
    page: &PageContext,
    config: &RallyConfig,
    notifier: Arc<dyn Notifier>,
) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(LocalClock);
    let worker = NotificationWorker::spawn(hub, notifier, Arc::clone(&clock), config.scheduler.clone());
    let presenter = page.presenter(clock, &config.presenter);
    page.publish_panels()?;

    let mut displays = presenter.displays();
    loop {
        tokio::select! {
            interrupted = tokio::signal::ctrl_c() => {
                interrupted.context("failed to listen for Ctrl-C")?;
                break;
            }
            display = displays.next() => match display {
                Some(Some(display)) => println!("{}  {display}", display.label),
                Some(None) => println!("no upcoming deadline"),
                None => break,
            },
        }
    }

    worker.shutdown().await;
    Ok(())
}

fn build_notifier(kind: NotifierKind) -> Result<Arc<dyn Notifier>> {
    match kind {
        NotifierKind::Log => Ok(Arc::new(LogNotifier)),
        #[cfg(feature = "desktop")]
        NotifierKind::Desktop => Ok(Arc::new(rallycard::GatedNotifier::new(
            rallycard::DesktopNotifier::new("rallycard"),
            rallycard::FixedPermission(rallycard::Permission::Granted),
        ))),
        #[cfg(not(feature = "desktop"))]
        NotifierKind::Desktop => anyhow::bail!("desktop notifications need the `desktop` feature"),
    }
}

fn parse_value(input: &str) -> Result<Millis> {
    match input.trim() {
        "unset" | "-" | "" => Ok(UNSET),
        text => Ok(parse_time(text)?),
    }
}

fn show(page: &PageContext, clock: &dyn Clock) {
    let card = page.card();
    println!("{}", card.title());
    if card.checkpoints.is_empty() {
        println!("  no checkpoints");
        return;
    }
    let cell = |ms: Millis| if ms == UNSET { "--:--:--".to_string() } else { format_time(ms) };
    println!(
        "  {:>3}  {:<16} {:>8} {:>8} {:>8} {:>8}",
        "#", "name", "prov", "start", "drive", "arrive"
    );
    for record in card.checkpoints.iter() {
        println!(
            "  {:>3}  {:<16} {:>8} {:>8} {:>8} {:>8}",
            record.number,
            record.name,
            cell(record.provisional_start_time),
            cell(record.actual_start_time),
            cell(record.driving_time),
            cell(record.arrival_time),
        );
    }
    let countdown = calculate_countdown(&card.checkpoints, clock.now_ms_from_midnight());
    println!("next: {countdown}");
}
