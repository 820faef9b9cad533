//! Terminal output for the pkgcache CLI
//!
//! Uses `cliclack` for spinners and step markers in interactive terminals,
//! with plain bracketed output in CI and when piped.
//!
//! ```rust,ignore
//! use pkgcache::ui::{self, TaskSpinner, UiContext};
//!
//! let ctx = UiContext::detect();
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Fetching react@18.2.0...");
//! spinner.stop("react@18.2.0 fetched");
//! ui::key_value(&ctx, "path", "/tmp/pkgcache-react@18.2.0");
//! ```

mod context;
mod output;
mod progress;
mod theme;

pub use context::UiContext;
pub use output::{
    key_value, key_value_status, remark, section, step_info, step_ok, step_ok_detail,
    step_warn_hint,
};
pub use progress::TaskSpinner;
pub use theme::{init_theme, PkgcacheTheme};
