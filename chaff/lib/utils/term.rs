//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Determines if stdout is attached to an ANSI-capable terminal.
pub fn is_ansi_interactive_terminal() -> bool {
    let stdout_is_tty = unsafe { libc::isatty(libc::STDOUT_FILENO) == 1 };
    let is_dumb = std::env::var("TERM").is_ok_and(|term| term == "dumb");
    let no_color = std::env::var_os("NO_COLOR").is_some();

    stdout_is_tty && !is_dumb && !no_color
}
