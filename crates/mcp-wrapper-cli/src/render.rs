use std::env;
use std::io::{self, IsTerminal};
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

/// Where user-facing lines go. Launch mode keeps stdout clean for the toolkit's own
/// protocol traffic and reports on stderr.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn is_terminal(self) -> bool {
        match self {
            Self::Stdout => io::stdout().is_terminal(),
            Self::Stderr => io::stderr().is_terminal(),
        }
    }
}

pub fn output_style_for(is_terminal: bool, no_color: bool) -> OutputStyle {
    if is_terminal && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub fn current_output_style(stream: Stream) -> OutputStyle {
    let no_color = env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    output_style_for(stream.is_terminal(), no_color)
}

pub fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "error" => "[ERR]",
        _ => "[..]",
    }
}

#[derive(Copy, Clone, Debug)]
pub struct TerminalRenderer {
    style: OutputStyle,
    stream: Stream,
}

impl TerminalRenderer {
    pub fn from_style(style: OutputStyle, stream: Stream) -> Self {
        Self { style, stream }
    }

    pub fn current(stream: Stream) -> Self {
        Self::from_style(current_output_style(stream), stream)
    }

    pub fn style(self) -> OutputStyle {
        self.style
    }

    pub fn print_status(self, status: &str, message: &str) {
        self.emit(&render_status_line(self.style, status, message));
    }

    pub fn print_section(self, title: &str) {
        match self.style {
            OutputStyle::Plain => {
                self.emit(title);
                self.emit(&"=".repeat(title.chars().count()));
            }
            OutputStyle::Rich => self.emit(&colorize(section_style(), &format!("== {title} =="))),
        }
    }

    pub fn print_lines(self, lines: &[String]) {
        for line in lines {
            self.emit(line);
        }
    }

    pub fn start_download(self, label: &str) -> DownloadProgress {
        DownloadProgress {
            style: self.style,
            stream: self.stream,
            label: label.to_string(),
            downloaded: 0,
            total: None,
            progress_bar: None,
            started_at: None,
        }
    }

    fn emit(self, line: &str) {
        match self.stream {
            Stream::Stdout => println!("{line}"),
            Stream::Stderr => eprintln!("{line}"),
        }
    }
}

/// Download progress that only appears once bytes actually start flowing.
pub struct DownloadProgress {
    style: OutputStyle,
    stream: Stream,
    label: String,
    downloaded: u64,
    total: Option<u64>,
    progress_bar: Option<ProgressBar>,
    started_at: Option<Instant>,
}

impl DownloadProgress {
    pub fn update(&mut self, downloaded: u64, total: Option<u64>) {
        self.downloaded = downloaded;
        self.total = total;
        self.started_at.get_or_insert_with(Instant::now);

        if self.style == OutputStyle::Plain {
            return;
        }
        let label = &self.label;
        let progress_bar = self
            .progress_bar
            .get_or_insert_with(|| new_progress_bar(label, total));
        if let Some(total) = total {
            progress_bar.set_length(total.max(1));
        }
        progress_bar.set_position(downloaded);
    }

    pub fn finish_success(mut self) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };

        progress_bar.finish_and_clear();
        if let Some(line) = render_progress_line(
            self.style,
            &self.label,
            self.downloaded,
            self.total,
            self.started_at.map(|started| started.elapsed()),
        ) {
            TerminalRenderer::from_style(self.style, self.stream).emit(&line);
        }
    }

    pub fn finish_abandon(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

fn new_progress_bar(label: &str, total: Option<u64>) -> ProgressBar {
    let (progress_bar, template) = match total {
        Some(total) => (
            ProgressBar::new(total.max(1)),
            "{spinner:.cyan.bold} {msg:<10} [{bar:20.cyan/blue}] {bytes:>10}/{total_bytes:10} {elapsed_precise}",
        ),
        None => (
            ProgressBar::new_spinner(),
            "{spinner:.cyan.bold} {msg:<10} {bytes:>10} {elapsed_precise}",
        ),
    };
    if let Ok(style) = ProgressStyle::with_template(template) {
        progress_bar.set_style(style.tick_chars(".oO@* ").progress_chars("=>-"));
    }
    progress_bar.set_message(label.to_string());
    progress_bar.enable_steady_tick(Duration::from_millis(80));
    progress_bar
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn progress_bar_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::BrightBlue.into()))
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub fn render_progress_line(
    style: OutputStyle,
    label: &str,
    current: u64,
    total: Option<u64>,
    elapsed: Option<Duration>,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }

    let width = 18_usize;
    let safe_total = total.unwrap_or(current).max(1);
    let bounded_current = current.min(safe_total);
    let filled = ((bounded_current as usize) * width) / (safe_total as usize);
    let bar = format!(
        "{}{}",
        "=".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    let percent = (bounded_current * 100) / safe_total;
    let counts = match total {
        Some(total) => format!("{}/{}", HumanBytes(current), HumanBytes(total)),
        None => HumanBytes(current).to_string(),
    };
    let suffix = elapsed
        .map(|value| format!(" complete in {}", format_elapsed(value)))
        .unwrap_or_default();

    Some(format!(
        "{} [{}] {:>3}% {}{}",
        colorize(progress_label_style(), label),
        colorize(progress_bar_style(), &bar),
        percent,
        counts,
        suffix
    ))
}
