/// Text surface showing the live heading.
pub trait HeadingDisplay: Send {
    fn show_heading(&mut self, text: &str);
}

/// Logs readouts instead of drawing them. Useful for headless hosts.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl HeadingDisplay for LogDisplay {
    fn show_heading(&mut self, text: &str) {
        log::trace!("heading {text}");
    }
}
