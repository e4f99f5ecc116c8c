//! Interactive terminal loop: render the current step, read a line,
//! dispatch it to the controller.

use std::path::Path;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use inspecta_core::photo::PhotoFile;
use inspecta_core::step::Step;
use inspecta_workflow::{Action, InspectionController, StepView, WorkflowError};

use crate::commands::{parse_command, split_identity, Command};

/// Whether the loop should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Shell {
    controller: InspectionController,
}

impl Shell {
    pub fn new(controller: InspectionController) -> Self {
        Self { controller }
    }

    /// Run until the user quits or stdin closes.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        loop {
            let view = self.controller.view();
            stdout.write_all(draw(&view).as_bytes()).await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                return Ok(());
            };
            if self.dispatch(view.step, parse_command(&line)).await == Flow::Quit {
                return Ok(());
            }
        }
    }

    async fn dispatch(&self, step: Step, command: Command) -> Flow {
        let result = match command {
            Command::Quit => return Flow::Quit,
            Command::Empty if step == Step::Welcome => self.controller.start().map(drop),
            Command::Empty => Ok(()),
            Command::Next if step == Step::Welcome => self.controller.start().map(drop),
            Command::Next => self.controller.advance().map(drop),
            Command::Back => self.controller.back().map(drop),
            Command::ContinueAnyway => self.controller.continue_anyway().map(drop),
            Command::Retake(key) => match key.or_else(|| step.photo_key()) {
                Some(key) => self.controller.retake(key),
                None => {
                    println!("Name the photo to retake, e.g. `r front`.");
                    Ok(())
                }
            },
            Command::Note(text) => self.controller.add_note(&text),
            Command::Finalize => self.controller.finalize().await,
            Command::Download => self.download_report().await,
            Command::NewInspection => {
                self.controller.reset();
                Ok(())
            }
            Command::Text(text) => self.submit_text(step, &text).await,
        };

        if let Err(e) = result {
            tracing::debug!(error = %e, step = %step, "Command failed");
            println!("! {}", e.user_message());
        }
        Flow::Continue
    }

    /// Free text means different things on different steps.
    async fn submit_text(&self, step: Step, text: &str) -> Result<(), WorkflowError> {
        match step {
            Step::AskId => match split_identity(text) {
                Some((name, document)) => self
                    .controller
                    .submit_identity(name, document)
                    .await
                    .map(drop),
                None => {
                    println!("Enter your name and document separated by a comma.");
                    Ok(())
                }
            },
            Step::AskPlate => self.controller.submit_plate(text).await.map(drop),
            Step::Photo(_) => match read_photo(Path::new(text)).await {
                Ok(file) => self.controller.capture_photo(file, None).await.map(|outcome| {
                    tracing::debug!(?outcome, "Photo captured");
                }),
                Err(e) => {
                    println!("! {e:#}");
                    Ok(())
                }
            },
            Step::DamageDetection => {
                self.controller.set_note_draft(text);
                if self.controller.commit_note_draft() {
                    println!("Note added.");
                }
                Ok(())
            }
            _ => {
                println!("Unrecognised input. Type `q` to quit.");
                Ok(())
            }
        }
    }

    async fn download_report(&self) -> Result<(), WorkflowError> {
        let pdf = self.controller.download_report().await?;
        let inspection_id = self
            .controller
            .store()
            .read(|s| s.finalize_result().and_then(|r| r.inspection_id.clone()))
            .unwrap_or_else(|| "report".to_string());
        let file_name = report_file_name(&inspection_id, chrono::Local::now());

        match tokio::fs::write(&file_name, &pdf).await {
            Ok(()) => {
                tracing::info!(file = %file_name, bytes = pdf.len(), "Report saved");
                println!("Report saved to {file_name}");
            }
            Err(e) => {
                tracing::error!(file = %file_name, error = %e, "Failed to write report");
                println!("! Could not write {file_name}: {e}");
            }
        }
        Ok(())
    }
}

// ---- private helpers ----

async fn read_photo(path: &Path) -> anyhow::Result<PhotoFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading photo {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".to_string());
    let content_type = PhotoFile::content_type_for(&file_name);
    Ok(PhotoFile::new(file_name, content_type, bytes))
}

fn report_file_name<Tz: chrono::TimeZone>(inspection_id: &str, now: chrono::DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let safe: String = inspection_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("inspection_{safe}_{}.pdf", now.format("%Y%m%d_%H%M%S"))
}

fn draw(view: &StepView) -> String {
    let (position, total) = view.progress;
    let mut out = format!("\n[{position}/{total}] {}\n", view.title);
    for line in &view.lines {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    if let Some(error) = &view.error {
        out.push_str(&format!("  ! {error}\n"));
    }
    if view.busy {
        out.push_str("  (working...)\n");
    }
    let hints: Vec<&str> = view.actions.iter().map(hint).collect();
    if !hints.is_empty() {
        out.push_str(&format!("  {}\n", hints.join("  ")));
    }
    out.push_str("> ");
    out
}

fn hint(action: &Action) -> &'static str {
    match action {
        Action::Start => "[enter] start",
        Action::SubmitIdentity => "<name>, <document>",
        Action::SubmitPlate => "<plate>",
        Action::Next => "[n]ext",
        Action::Back => "[b]ack",
        Action::CapturePhoto(_) => "<photo path>",
        Action::Retake(_) => "[r]etake",
        Action::ContinueAnyway => "[c]ontinue anyway",
        Action::AddNote => "note <text>",
        Action::Finalize => "[f]inalize",
        Action::DownloadReport => "[d]ownload report",
        Action::NewInspection => "new",
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn report_file_name_is_filesystem_safe() {
        let now = chrono::Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(
            report_file_name("INS/42 a", now),
            "inspection_INS_42_a_20260304_050607.pdf"
        );
    }

    #[test]
    fn draw_lists_error_and_hints() {
        let view = StepView {
            step: Step::AskPlate,
            progress: (4, 16),
            title: "Vehicle plate".into(),
            lines: vec!["Enter the plate".into()],
            error: Some("Vehicle not found".into()),
            busy: false,
            actions: vec![Action::SubmitPlate, Action::Back],
        };
        let text = draw(&view);
        assert!(text.starts_with("\n[4/16] Vehicle plate\n"));
        assert!(text.contains("  ! Vehicle not found\n"));
        assert!(text.contains("<plate>  [b]ack"));
        assert!(text.ends_with("> "));
    }

    #[tokio::test]
    async fn missing_photo_file_is_an_error() {
        let err = read_photo(Path::new("/definitely/not/here.jpg"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reading photo"));
    }
}
