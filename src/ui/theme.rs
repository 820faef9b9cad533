//! cliclack theme

use cliclack::ThemeState;
use console::Style;

/// Blue bars, green on success
#[derive(Debug, Clone, Default)]
pub struct PkgcacheTheme;

impl cliclack::Theme for PkgcacheTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().blue(),
            ThemeState::Error(_) => Style::new().red(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().blue().dim(),
        }
    }

    fn state_symbol_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().blue(),
            ThemeState::Error(_) => Style::new().red(),
            ThemeState::Cancel => Style::new().dim(),
            ThemeState::Submit => Style::new().green(),
        }
    }
}

/// Install the theme globally; call once before any cliclack output
pub fn init_theme() {
    cliclack::set_theme(PkgcacheTheme);
}
