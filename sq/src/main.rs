use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use log::info;

use segmentqueue::cli::{Cli, Command};
use segmentqueue::config::Config;
use segmentqueue::{Bundle, SegmentQueue};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    Ok(())
}

fn checked_out(queue: &SegmentQueue, id: &str) -> Result<Bundle> {
    match queue.checked_out_bundle(id) {
        Some(bundle) => Ok(bundle),
        None => bail!("No valid checked-out bundle with ID {}", id),
    }
}

fn describe(bundle: &Bundle) -> String {
    format!(
        "{} {} {}",
        bundle.id.cyan(),
        bundle.kind.to_string().yellow(),
        format!("({} middles)", bundle.middles.len()).dimmed()
    )
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let root = cli.queue.unwrap_or(config.queue_dir);

    info!("segmentqueue starting at {}", root.display());
    let queue = SegmentQueue::open(&root)
        .context(format!("Failed to open queue at {}", root.display()))?
        .with_archive_keep(config.archive_keep);

    match cli.command {
        Command::List => {
            let pending = queue.scan();
            let checked_out = queue.checked_out();
            if pending.is_empty() && checked_out.is_empty() {
                println!("No bundles queued");
            }
            for bundle in &pending {
                println!("{}", describe(bundle));
            }
            for id in checked_out {
                println!("{} {}", id.cyan(), "checked out".red());
            }
        }
        Command::Archive => {
            let archived = queue.archived();
            if archived.is_empty() {
                println!("Archive is empty");
            } else {
                for id in archived {
                    println!("{}", id);
                }
            }
        }
        Command::Recover => {
            let stats = queue.recover_orphans();
            println!("{} Recovered orphans ({})", "✓".green(), stats);
        }
        Command::Prune { keep } => {
            let removed = queue.prune(keep.unwrap_or(config.archive_keep));
            println!("{} Pruned {} archive entries", "✓".green(), removed);
        }
        Command::Checkout => match queue.checkout() {
            Some(bundle) => println!("{} Checked out {}", "✓".green(), describe(&bundle)),
            None => println!("Nothing to check out"),
        },
        Command::Release { id } => {
            let bundle = checked_out(&queue, &id)?;
            if !queue.release(&bundle) {
                bail!("Failed to release bundle {}", id);
            }
            println!("{} Released {}", "✓".green(), id.cyan());
        }
        Command::Discard { id } => {
            let bundle = checked_out(&queue, &id)?;
            if !queue.discard(&bundle) {
                bail!("Failed to discard bundle {}", id);
            }
            println!("{} Discarded {}", "✓".green(), id.cyan());
        }
        Command::Complete { id } => {
            let bundle = checked_out(&queue, &id)?;
            if !queue.complete(&bundle) {
                bail!("Failed to complete bundle {}", id);
            }
            println!("{} Completed {}", "✓".green(), id.cyan());
        }
    }

    Ok(())
}
