// Terminal frontend: stdin settings prompts, an indicatif bar per job, printed summaries

use crate::models::{JobSetting, RunMode, SettingField};
use crate::orchestrator::{AlertLevel, DialogDecision, DialogRequest, EventSender, Frontend, RunSummary, UiEvent};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogChoice {
    Accept,
    Edit,
    Skip,
}

pub fn parse_choice(input: &str) -> Option<DialogChoice> {
    match input.trim().to_lowercase().as_str() {
        "" | "y" | "yes" => Some(DialogChoice::Accept),
        "e" | "edit" => Some(DialogChoice::Edit),
        "s" | "skip" | "n" | "no" => Some(DialogChoice::Skip),
        _ => None,
    }
}

fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn print_setting<W: Write>(output: &mut W, setting: &JobSetting) -> io::Result<()> {
    for field in SettingField::ALL {
        writeln!(output, "  {:<20} {}", field.label(), field.format(setting))?;
    }
    Ok(())
}

/// Walk every field, keeping the current value on an empty answer
fn edit_setting<R: BufRead, W: Write>(input: &mut R, output: &mut W, setting: &mut JobSetting) -> io::Result<()> {
    for field in SettingField::ALL {
        loop {
            write!(output, "  {} [{}]: ", field.label(), field.format(setting))?;
            output.flush()?;
            let Some(answer) = read_line(input)? else {
                return Ok(());
            };
            if answer.is_empty() {
                break;
            }
            match field.set_from_str(setting, &answer) {
                Ok(()) => break,
                Err(e) => writeln!(output, "  {}", e)?,
            }
        }
    }
    *setting = setting.normalized();
    Ok(())
}

/// Run one settings dialog on a terminal. End of input counts as skipping.
pub fn prompt_dialog<R: BufRead, W: Write>(
    request: &DialogRequest,
    input: &mut R,
    output: &mut W,
) -> io::Result<DialogDecision> {
    let mut setting = request.defaults;
    writeln!(
        output,
        "[{}/{}] {} settings for {} ({})",
        request.position,
        request.total,
        request.mode.label(),
        request.phenotype,
        request.model.label()
    )?;

    loop {
        print_setting(output, &setting)?;
        write!(output, "Accept [Y], edit [e] or skip [s]? ")?;
        output.flush()?;
        let Some(answer) = read_line(input)? else {
            return Ok(DialogDecision::Rejected);
        };
        match parse_choice(&answer) {
            Some(DialogChoice::Accept) => return Ok(DialogDecision::Accepted(setting)),
            Some(DialogChoice::Skip) => return Ok(DialogDecision::Rejected),
            Some(DialogChoice::Edit) => edit_setting(input, output, &mut setting)?,
            None => writeln!(output, "Please answer y, e or s")?,
        }
    }
}

pub struct ConsoleFrontend {
    auto_accept: bool,
    bar: Option<ProgressBar>,
}

impl ConsoleFrontend {
    pub fn new(auto_accept: bool) -> Self {
        Self { auto_accept, bar: None }
    }

    fn finish_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }
}

fn job_bar(phenotype: &str, position: usize, total: usize) -> ProgressBar {
    let bar = ProgressBar::new(100);
    match ProgressStyle::default_bar().template("{prefix:>16} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}%") {
        Ok(style) => bar.set_style(style.progress_chars("#>-")),
        Err(e) => warn!("Progress bar template rejected: {}", e),
    }
    bar.set_prefix(format!("{} ({}/{})", phenotype, position, total));
    bar
}

impl Frontend for ConsoleFrontend {
    fn alert(&mut self, level: AlertLevel, message: &str) {
        let tag = match level {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
        };
        eprintln!("{}: {}", tag, message);
    }

    fn open_settings_dialog(&mut self, request: DialogRequest, reply: EventSender) {
        if self.auto_accept {
            println!(
                "[{}/{}] Using saved settings for {}",
                request.position, request.total, request.phenotype
            );
            let _ = reply.send(request.accept(request.defaults));
            return;
        }

        // Reading stdin blocks, so the dialog lives on its own thread
        std::thread::spawn(move || {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout();
            let decision = prompt_dialog(&request, &mut input, &mut output).unwrap_or_else(|e| {
                warn!("Settings prompt failed for {}: {}", request.phenotype, e);
                DialogDecision::Rejected
            });
            let _ = reply.send(UiEvent::DialogResolved {
                ticket: request.ticket,
                decision,
            });
        });
    }

    fn job_started(&mut self, phenotype: &str, position: usize, total: usize) {
        self.finish_bar();
        self.bar = Some(job_bar(phenotype, position, total));
    }

    fn progress(&mut self, _phenotype: &str, percent: u8) {
        if let Some(bar) = &self.bar {
            bar.set_position(percent as u64);
        }
    }

    fn show_summary(&mut self, summary: &RunSummary) {
        self.finish_bar();
        println!("\n{}\n{}", summary.title(), summary.render());
    }

    fn set_trigger_enabled(&mut self, _mode: RunMode, _enabled: bool) {}
}
