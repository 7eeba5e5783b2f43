//! Line-oriented console driver for an interview.
//!
//! Plain lines are the case overview (in the input phase) or answers (while
//! interviewing). Slash commands control the session:
//!
//! | Command   | Effect                                  |
//! |-----------|-----------------------------------------|
//! | `/next`   | close the active topic (forced advance) |
//! | `/report` | enter the report phase and write a PDF  |
//! | `/reset`  | discard the session and start over      |
//! | `/status` | show progress                           |
//! | `/quit`   | leave; the session stays stored         |

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::error::{AppResult, ReportError};
use crate::interview::{
    InterviewMachine, Phase, Session, StepStatus, SynthesisResult, TurnOutcome, TOPICS,
};
use crate::storage::SessionStore;

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/next`: close the active topic.
    Next,
    /// `/report`: enter the report phase and write the PDF.
    Report,
    /// `/reset`: discard the session.
    Reset,
    /// `/status`: show progress.
    Status,
    /// `/quit` or `/exit`.
    Quit,
    /// Free text: the case overview or an answer.
    Text(String),
    /// A slash command that is not recognised.
    Unknown(String),
}

impl Command {
    /// Parse a raw input line.
    ///
    /// ```
    /// use ethics_navi::console::Command;
    ///
    /// assert_eq!(Command::parse("  /next\n"), Command::Next);
    /// assert_eq!(Command::parse("/exit"), Command::Quit);
    /// assert_eq!(Command::parse("He is 82."), Command::Text("He is 82.".to_string()));
    /// ```
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "/next" => Command::Next,
            "/report" => Command::Report,
            "/reset" => Command::Reset,
            "/status" => Command::Status,
            "/quit" | "/exit" => Command::Quit,
            _ if trimmed.starts_with('/') => Command::Unknown(trimmed.to_string()),
            _ => Command::Text(trimmed.to_string()),
        }
    }
}

/// File name of the rendered report of a session.
pub fn report_file_name(session: &Session) -> String {
    format!("ethics-navi-{}.pdf", session.id)
}

/// Write report bytes into `dir`, creating it if needed.
pub fn write_report(dir: &Path, session: &Session, bytes: &[u8]) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(session));
    std::fs::write(&path, bytes)?;
    Ok(path)
}

/// Interactive driver that persists the session after every action.
pub struct Console {
    machine: InterviewMachine,
    store: Arc<dyn SessionStore>,
    output_dir: PathBuf,
}

impl Console {
    /// Create a console that writes reports into `output_dir`.
    pub fn new(
        machine: InterviewMachine,
        store: Arc<dyn SessionStore>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            machine,
            store,
            output_dir: output_dir.into(),
        }
    }

    /// Run until `/quit` or end of input.
    pub async fn run<R, W>(&self, session: &mut Session, mut reader: R, out: &mut W) -> AppResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        info!(session_id = %session.id, phase = %session.phase(), "Console started");
        self.greet(session, out).await?;

        let mut line = String::new();
        loop {
            line.clear();
            write!(out, "> ")?;
            out.flush()?;

            let bytes_read = reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                info!("EOF received, leaving console");
                break;
            }

            let command = Command::parse(&line);
            debug!(?command, "Console command");
            if command == Command::Quit {
                break;
            }
            self.handle(session, command, out).await?;
            self.store.save(session).await?;
        }

        writeln!(out, "Session {} saved.", session.id)?;
        Ok(())
    }

    /// Apply one command to the session.
    pub async fn handle<W: Write>(&self, session: &mut Session, command: Command, out: &mut W) -> AppResult<()> {
        match command {
            Command::Text(text) => match session.phase() {
                Phase::Input => {
                    let outcome = self.machine.submit_case(session, &text);
                    self.show_outcome(session, outcome, out).await?;
                }
                Phase::Interview => {
                    let key = session.active_topic_index().key();
                    let outcome = self
                        .machine
                        .submit_turn(session, key, &text, |f| stream_fragment(out, f))
                        .await;
                    self.show_outcome(session, outcome, out).await?;
                }
                Phase::Summary | Phase::Report => {
                    writeln!(out, "The interview is finished. Use /report, /reset or /quit.")?;
                }
            },
            Command::Next => {
                let key = session.active_topic_index().key();
                let outcome = self.machine.force_advance(session, key).await;
                self.show_outcome(session, outcome, out).await?;
            }
            Command::Report => {
                let outcome = self.machine.request_report(session).await;
                self.show_outcome(session, outcome, out).await?;
            }
            Command::Reset => {
                let previous = session.id.clone();
                self.machine.reset(session);
                self.store.delete(&previous).await?;
                writeln!(out, "Session cleared.")?;
                self.greet(session, out).await?;
            }
            Command::Status => show_progress(session, out)?,
            Command::Quit => {}
            Command::Unknown(name) => {
                writeln!(out, "Unknown command {name}. Commands: /next /report /reset /status /quit")?;
            }
        }
        Ok(())
    }

    async fn greet<W: Write>(&self, session: &mut Session, out: &mut W) -> AppResult<()> {
        show_progress(session, out)?;
        match session.phase() {
            Phase::Input => {
                writeln!(out, "Describe the case (patient, situation, what is in question).")?;
            }
            Phase::Interview => self.open_topic(session, out).await?,
            Phase::Summary => {
                if let Some(synthesis) = self.machine.summarize(session).await {
                    show_synthesis(synthesis, out)?;
                }
            }
            Phase::Report => {
                writeln!(out, "The report phase is reached. Use /report to write the PDF again.")?;
            }
        }
        Ok(())
    }

    async fn open_topic<W: Write>(&self, session: &mut Session, out: &mut W) -> AppResult<()> {
        if let Some(topic) = session.active_topic() {
            let step = topic.key.index().get() + 1;
            writeln!(out, "\n== {}. {} ==", step, topic.title)?;
            for message in session.conversation(topic.key) {
                writeln!(out, "{:?}: {}", message.role, message.content)?;
            }
        }
        let outcome = self
            .machine
            .open_active_topic(session, |f| stream_fragment(out, f))
            .await;
        match outcome {
            TurnOutcome::Asked(_) => writeln!(out)?,
            TurnOutcome::Interrupted => {
                writeln!(out, "\nThe question could not be generated. Type an answer or /next.")?
            }
            _ => {}
        }
        Ok(())
    }

    async fn show_outcome<W: Write>(
        &self,
        session: &mut Session,
        outcome: TurnOutcome,
        out: &mut W,
    ) -> AppResult<()> {
        match outcome {
            TurnOutcome::Started(_) => self.open_topic(session, out).await?,
            TurnOutcome::Asked(_) => writeln!(out)?,
            TurnOutcome::Advanced { from, .. } => {
                writeln!(out, "Closed {}.", from.topic().title)?;
                if let Some(summary) = session.summary(from) {
                    writeln!(out, "Summary: {summary}")?;
                }
                self.open_topic(session, out).await?;
            }
            TurnOutcome::Finished => {
                writeln!(out, "All four topics are organized.")?;
                if let Some(synthesis) = self.machine.summarize(session).await {
                    show_synthesis(synthesis, out)?;
                }
                writeln!(out, "Use /report to write the PDF report.")?;
            }
            TurnOutcome::ReportReady => self.write_report(session, out)?,
            TurnOutcome::Ignored(reason) => writeln!(out, "Ignored: {reason}.")?,
            TurnOutcome::Interrupted => {
                writeln!(out, "\nThe question stream was interrupted. Please answer again.")?
            }
        }
        Ok(())
    }

    fn write_report<W: Write>(&self, session: &Session, out: &mut W) -> AppResult<()> {
        let written = self
            .machine
            .render_report(session)
            .and_then(|bytes| write_report(&self.output_dir, session, &bytes));
        match written {
            Ok(path) => writeln!(out, "Report written to {}", path.display())?,
            Err(e) => {
                warn!(error = %e, "Report generation failed");
                writeln!(out, "Report generation failed: {e}")?;
            }
        }
        Ok(())
    }
}

fn stream_fragment<W: Write>(out: &mut W, fragment: &str) {
    // Live display only; a failed write must not abandon the stream.
    let _ = write!(out, "{fragment}");
    let _ = out.flush();
}

/// Print the seven progress steps.
pub fn show_progress<W: Write>(session: &Session, out: &mut W) -> std::io::Result<()> {
    let steps = session
        .progress()
        .into_iter()
        .map(|step| {
            let mark = match step.status {
                StepStatus::Done => "[x]",
                StepStatus::Current => "[>]",
                StepStatus::Pending => "[ ]",
            };
            format!("{mark} {}", step.label)
        })
        .collect::<Vec<_>>();
    writeln!(out, "{}", steps.join("  "))
}

/// Print the four-box table, discussion points and tensions.
pub fn show_synthesis<W: Write>(synthesis: &SynthesisResult, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "\n== Jonsen's Four-Box Table ==")?;
    for topic in TOPICS.iter() {
        writeln!(out, "-- {}. {} --", topic.key.index().get() + 1, topic.short_title)?;
        for field in synthesis.entry(topic.key) {
            writeln!(out, "[{}] {}", field.label, field.text)?;
        }
    }

    writeln!(out, "\n== Points for Discussion ==")?;
    for (i, point) in synthesis.discussion_points.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, point)?;
    }

    if !synthesis.tensions.is_empty() {
        writeln!(out, "\n== Tensions Between Quadrants ==")?;
        for tension in &synthesis.tensions {
            writeln!(out, "\u{2022} {tension}")?;
        }
    }
    Ok(())
}
