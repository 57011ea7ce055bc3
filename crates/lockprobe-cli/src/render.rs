use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use lockprobe_core::ParseError;
use lockprobe_runner::{CommandFailedError, TaskOutcome};

use crate::assertions::AssertionFailure;
use crate::harness::ScenarioReport;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn resolve_output_style(stdout_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

/// Scenario level status.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    Pass,
    Fail,
    Skip,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skip => "SKIP",
        }
    }

    fn style(self) -> Style {
        let color = match self {
            Self::Pass => AnsiColor::BrightGreen,
            Self::Fail => AnsiColor::BrightRed,
            Self::Skip => AnsiColor::BrightYellow,
        };
        Style::new()
            .fg_color(Some(color.into()))
            .effects(Effects::BOLD)
    }
}

pub fn render_status_line(style: OutputStyle, status: Status, message: &str) -> String {
    match style {
        OutputStyle::Plain => format!("{} {message}", status.label()),
        OutputStyle::Rich => format!(
            "{} {message}",
            colorize(status.style(), &format!("[{}]", status.label()))
        ),
    }
}

/// Reporting category of a scenario error, taken from the first typed error
/// in its chain.
pub fn error_category(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if cause.downcast_ref::<AssertionFailure>().is_some() {
            return "assertion failed";
        }
        if cause.downcast_ref::<CommandFailedError>().is_some() {
            return "command failed";
        }
        if cause.downcast_ref::<ParseError>().is_some() {
            return "parse error";
        }
    }
    "error"
}

pub fn format_report_lines(report: &ScenarioReport, style: OutputStyle) -> Vec<String> {
    let timing = format!("{} ({})", report.name, format_elapsed(report.elapsed));
    let mut lines = Vec::new();
    match &report.outcome {
        Ok(checked) => lines.push(render_status_line(
            style,
            Status::Pass,
            &format!("{timing}: {checked} expectations held"),
        )),
        Err(err) => {
            lines.push(render_status_line(
                style,
                Status::Fail,
                &format!("{timing}: {}", error_category(err)),
            ));
            lines.extend(format!("{err:#}").lines().map(|line| format!("    {line}")));
        }
    }
    if let Some(artifacts) = &report.artifacts {
        lines.push(format!("    artifacts kept in {}", artifacts.display()));
    }
    lines
}

pub fn format_skipped_line(name: &str, style: OutputStyle) -> String {
    render_status_line(style, Status::Skip, &format!("{name}: not started after stop"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_outcomes(outcomes: &[TaskOutcome<ScenarioReport>]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome {
                TaskOutcome::Finished(report) if report.passed() => summary.passed += 1,
                TaskOutcome::Finished(_) => summary.failed += 1,
                TaskOutcome::Skipped => summary.skipped += 1,
            }
        }
        summary
    }

    pub fn succeeded(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    pub fn render(&self, style: OutputStyle) -> String {
        let total = self.passed + self.failed + self.skipped;
        let line = format!(
            "{total} scenarios: {} passed, {} failed, {} skipped",
            self.passed, self.failed, self.skipped
        );
        match style {
            OutputStyle::Plain => line,
            OutputStyle::Rich if self.succeeded() => colorize(Status::Pass.style(), &line),
            OutputStyle::Rich => colorize(Status::Fail.style(), &line),
        }
    }
}

/// Progress over finished scenarios. Only drawn in rich mode.
pub struct ScenarioProgress {
    style: OutputStyle,
    progress_bar: Option<ProgressBar>,
}

impl ScenarioProgress {
    pub fn start(style: OutputStyle, total: u64) -> Self {
        let progress_bar = if style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new(total.max(1));
            if let Ok(template) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<12} [{bar:20.cyan/blue}] {pos:>3}/{len:3} {elapsed_precise}",
            ) {
                progress_bar.set_style(template.progress_chars("=>-"));
            }
            progress_bar.set_message("scenarios");
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };
        Self {
            style,
            progress_bar,
        }
    }

    /// Prints report lines without tearing the bar.
    pub fn finished(&self, report: &ScenarioReport) {
        let lines = format_report_lines(report, self.style);
        match &self.progress_bar {
            Some(progress_bar) => {
                for line in &lines {
                    progress_bar.println(line);
                }
                progress_bar.inc(1);
            }
            None => lines.iter().for_each(|line| println!("{line}")),
        }
    }

    pub fn finish(self) {
        if let Some(progress_bar) = self.progress_bar {
            progress_bar.finish_and_clear();
        }
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
