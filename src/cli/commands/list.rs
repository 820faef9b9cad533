//! List command - show cached packages

use crate::cache::{CacheEntry, CacheState, PackageCache};
use crate::cli::args::{ListArgs, OutputFormat};
use crate::error::PkgcacheResult;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the list command
pub async fn execute(args: ListArgs, cache: &PackageCache) -> PkgcacheResult<()> {
    let entries = cache.list().await?;

    if entries.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(
                    &ctx,
                    &format!("No cached packages in {}", cache.root().display()),
                );
            }
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(cache, &entries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.path.display());
            }
        }
    }

    Ok(())
}

fn print_table(cache: &PackageCache, entries: &[CacheEntry]) {
    let ctx = UiContext::detect();
    ui::section(&ctx, &format!("Cache root: {}", cache.root().display()));

    println!(
        "{:<50} {:<10} {:<20}",
        style("DIRECTORY").bold(),
        style("STATE").bold(),
        style("COMPLETED").bold()
    );
    println!("{}", "-".repeat(80));

    for entry in entries {
        let state = match entry.state {
            CacheState::Complete => style("complete").green(),
            CacheState::Building => style("building").yellow(),
            CacheState::Miss => style("miss").dim(),
        };

        let completed = entry
            .marker
            .as_ref()
            .map(|m| m.completed_at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!("{:<50} {:<10} {:<20}", entry.dir_name, state, completed);
    }

    println!();
    println!("{} package(s)", entries.len());
}
