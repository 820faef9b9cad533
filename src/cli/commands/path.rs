//! Path command - show where a package is cached

use crate::cache::{PackageCache, PackageIdentity};
use crate::cli::args::PathArgs;
use crate::error::PkgcacheResult;
use crate::ui::{self, UiContext};

/// Execute the path command
pub async fn execute(args: PathArgs, cache: &PackageCache) -> PkgcacheResult<()> {
    let ctx = UiContext::detect();
    let identity = PackageIdentity::new(args.name, args.version)?;
    let key = cache.key_for(&identity);
    let state = cache.state(&identity).await?;

    ui::key_value(&ctx, "path", &key.path().display().to_string());
    ui::key_value_status(&ctx, "state", &state.to_string(), state.is_hit());

    Ok(())
}
