use clap::builder::styling::{AnsiColor, Effects, Style, Styles};
use std::fmt::Write;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

#[cfg(not(test))]
/// Whether stdout is an ANSI-capable interactive terminal.
static IS_ANSI_TERMINAL: std::sync::LazyLock<bool> =
    std::sync::LazyLock::new(crate::utils::is_ansi_interactive_terminal);

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Applies the [`styles`] palette to text printed outside of clap.
pub trait AnsiStyles {
    /// Apply error style to text
    fn error(&self) -> String;
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the styles used by the CLI.
pub fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Green.on_default() | Effects::BOLD)
        .invalid(AnsiColor::Red.on_default() | Effects::BOLD)
}

fn apply_style(text: &str, style: &Style) -> String {
    #[cfg(not(test))]
    if !*IS_ANSI_TERMINAL {
        return text.to_string();
    }

    #[cfg(test)]
    {
        if std::env::var("TERM").unwrap_or_default() == "dumb" {
            return text.to_string();
        }
    }

    let mut styled = String::with_capacity(text.len() + 20);
    let _ = write!(styled, "{style}{text}{}", style.render_reset());
    styled
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl AnsiStyles for str {
    fn error(&self) -> String {
        apply_style(self, styles().get_error())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
