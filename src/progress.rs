use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner style used while a network step (clone, push) is running.
/// - Yellow spinner with animated braille-style frames.
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[33m{spinner}\x1b[0m {wide_msg}")
        .unwrap()
        .tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"])
}

/// Green check mark followed by the final message.
pub fn ok_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[32m✔\x1b[0m {wide_msg}").unwrap()
}

/// Red cross followed by the error message.
pub fn err_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[31m✘\x1b[0m {wide_msg}").unwrap()
}

/// Run `f` behind a spinner labelled `msg`, finishing with ✔ or ✘.
///
/// The spinner is hidden when stderr is not a terminal, so CI logs only get
/// the tracing output.
pub fn with_spinner<T, E: std::fmt::Display>(
    msg: impl Into<String>,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let msg = msg.into();
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(msg.clone());
    pb.enable_steady_tick(Duration::from_millis(80));

    let res = f();
    match &res {
        Ok(_) => {
            pb.set_style(ok_style());
            pb.finish_with_message(msg);
        }
        Err(e) => {
            pb.set_style(err_style());
            pb.finish_with_message(format!("{msg} (error: {e})"));
        }
    }
    res
}
