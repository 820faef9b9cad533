//! Fetch command - populate the cache for one package

use crate::cache::{Origin, PackageCache, PackageIdentity};
use crate::cli::args::FetchArgs;
use crate::error::PkgcacheResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the fetch command
pub async fn execute(args: FetchArgs, cache: &PackageCache) -> PkgcacheResult<()> {
    let identity = PackageIdentity::new(args.name, args.version)?;

    if args.json {
        let resolution = cache.ensure(&identity, &args.url).await?;
        println!("{}", serde_json::to_string_pretty(&resolution)?);
        return Ok(());
    }

    let ctx = UiContext::detect();
    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Resolving {}...", identity));

    let resolution = match cache.ensure(&identity, &args.url).await {
        Ok(resolution) => resolution,
        Err(e) => {
            spinner.stop_error(&format!("{} failed during {}", identity, e.stage()));
            return Err(e);
        }
    };

    match resolution.origin {
        Origin::CacheHit => spinner.stop(&format!("{} already cached", identity)),
        Origin::Fetched => spinner.stop(&format!("{} fetched and extracted", identity)),
    }

    ui::key_value(&ctx, "path", &resolution.path.display().to_string());

    Ok(())
}
