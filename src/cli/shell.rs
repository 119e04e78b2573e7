//! Interactive session: pick a genome file and drugs, submit once, then
//! inspect and export the report.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::entities::request::{DrugSelection, GenomeFile};
use crate::error::PharmaGuardError;
use crate::export::ExportService;
use crate::render::markdown::{RenderOptions, failure_markdown, report_markdown};
use crate::session::orchestrator::{Phase, RequestOrchestrator};
use crate::session::sections::{Section, SectionToggleStore};
use crate::sources::analysis::AnalysisService;

const PROMPT: &str = "pharmaguard> ";

const HELP: &str = "\
Commands:
  file <path.vcf>          choose the genome file
  drug <NAME>...           select or deselect drugs
  drugs                    show the drug catalog and current selection
  submit                   run the analysis
  show                     show the report or the current status
  toggle <card> <section>  open/close a card section (variants, explanation)
  expand <section|all>     open a section on every card
  copy | download | print  export the report
  json                     print the raw report JSON
  reset                    clear the report or error
  help                     show this help
  quit                     leave the session
";

#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Output(String),
    Quit,
}

pub struct ShellSession<S> {
    orchestrator: RequestOrchestrator<S>,
    genome_file: Option<GenomeFile>,
    drugs: DrugSelection,
    sections: SectionToggleStore,
    export: ExportService,
    color: bool,
}

impl<S: AnalysisService> ShellSession<S> {
    pub fn new(service: S, export: ExportService, color: bool) -> Self {
        Self {
            orchestrator: RequestOrchestrator::new(service),
            genome_file: None,
            drugs: DrugSelection::new(),
            sections: SectionToggleStore::new(),
            export,
            color,
        }
    }

    pub fn phase(&self) -> Phase {
        self.orchestrator.phase()
    }

    pub fn drugs(&self) -> &DrugSelection {
        &self.drugs
    }

    pub fn genome_file(&self) -> Option<&GenomeFile> {
        self.genome_file.as_ref()
    }

    /// Executes one input line.
    pub async fn handle(&mut self, line: &str) -> Result<Reply, PharmaGuardError> {
        let words = shlex::split(line)
            .ok_or_else(|| PharmaGuardError::InvalidArgument("Unbalanced quotes".into()))?;
        let Some((command, args)) = words.split_first() else {
            return Ok(Reply::Output(String::new()));
        };
        debug!(command = %command, args = args.len(), "shell command");

        let out = match command.to_ascii_lowercase().as_str() {
            "file" => self.choose_file(args).await?,
            "drug" => self.toggle_drugs(args)?,
            "drugs" => self.drug_overview(),
            "submit" | "analyze" => self.submit().await?,
            "show" => self.show()?,
            "toggle" => self.toggle_section(args)?,
            "expand" => self.expand(args)?,
            "copy" => {
                let tool = self.export.copy_to_clipboard(self.current_report()?).await?;
                format!("Report JSON copied to the clipboard ({tool}).\n")
            }
            "download" => {
                let path = self.export.trigger_download(self.current_report()?).await?;
                format!("Saved {}\n", path.display())
            }
            "print" => {
                let plain = report_markdown(
                    self.current_report()?,
                    &self.sections,
                    RenderOptions { color: false },
                )?;
                let tool = self.export.trigger_print(&plain).await?;
                format!("Report sent to the printer ({tool}).\n")
            }
            "json" => crate::export::serialize(self.current_report()?)? + "\n",
            "reset" => {
                self.orchestrator.reset()?;
                self.sections.clear();
                "Ready for a new analysis.\n".to_string()
            }
            "help" | "?" => HELP.to_string(),
            "quit" | "exit" => return Ok(Reply::Quit),
            other => {
                return Err(PharmaGuardError::InvalidArgument(format!(
                    "Unknown command \"{other}\". Type `help` for the command list."
                )));
            }
        };
        Ok(Reply::Output(out))
    }

    async fn choose_file(&mut self, args: &[String]) -> Result<String, PharmaGuardError> {
        let [path] = args else {
            return Err(PharmaGuardError::InvalidArgument(
                "Usage: file <path.vcf>".into(),
            ));
        };
        let file = GenomeFile::load(Path::new(path)).await?;
        let out = format!("Genome file: {} ({} bytes)\n", file.name(), file.len());
        self.genome_file = Some(file);
        Ok(out)
    }

    fn toggle_drugs(&mut self, args: &[String]) -> Result<String, PharmaGuardError> {
        if args.is_empty() {
            return Err(PharmaGuardError::InvalidArgument(
                "Usage: drug <NAME>...".into(),
            ));
        }
        let names: Vec<&str> = args
            .iter()
            .flat_map(|a| a.split(','))
            .filter(|a| !a.trim().is_empty())
            .collect();
        // Applied to a copy so a bad name leaves the selection untouched.
        let mut next = self.drugs.clone();
        let mut out = String::new();
        for name in names {
            let selected = next.toggle(name)?;
            let verb = if selected { "selected" } else { "removed" };
            out.push_str(&format!("{} {verb}\n", name.trim().to_ascii_uppercase()));
        }
        self.drugs = next;
        out.push_str(&format!("Selection: {}\n", selection_line(&self.drugs)));
        Ok(out)
    }

    fn drug_overview(&self) -> String {
        let mut out = String::from("| | Drug | Gene |\n|---|------|------|\n");
        for drug in crate::entities::drug::CATALOG {
            let mark = if self.drugs.contains(drug.name) { "x" } else { " " };
            out.push_str(&format!("| [{mark}] | {} | {} |\n", drug.name, drug.gene));
        }
        let custom: Vec<&str> = self
            .drugs
            .iter()
            .filter(|d| crate::entities::drug::find(d).is_none())
            .collect();
        if !custom.is_empty() {
            out.push_str(&format!("\nOther selected: {}\n", custom.join(", ")));
        }
        out
    }

    async fn submit(&mut self) -> Result<String, PharmaGuardError> {
        // A failure banner is dismissed by the next submission.
        if self.orchestrator.phase() == Phase::Error {
            self.orchestrator.reset()?;
        }
        let phase = self
            .orchestrator
            .submit(self.genome_file.as_ref(), &self.drugs)
            .await?;
        self.genome_file = None;
        self.drugs.clear();
        self.sections.clear();

        match phase {
            Phase::Success => self.show(),
            _ => {
                let mut out = self
                    .orchestrator
                    .failure()
                    .map(failure_markdown)
                    .unwrap_or_default();
                out.push_str("Choose a file and drugs again, then `submit`.\n");
                Ok(out)
            }
        }
    }

    fn show(&self) -> Result<String, PharmaGuardError> {
        if let Some(report) = self.orchestrator.report() {
            return report_markdown(report, &self.sections, RenderOptions { color: self.color });
        }
        if let Some(failure) = self.orchestrator.failure() {
            return Ok(failure_markdown(failure));
        }
        let file = self.genome_file.as_ref().map_or("-", |f| f.name());
        let mut out = format!(
            "Status: {}\nGenome file: {file}\nDrugs: {}\nExport dir: {}\n",
            self.orchestrator.phase(),
            selection_line(&self.drugs),
            self.export.export_dir().display()
        );
        if self.orchestrator.can_submit()
            && self.genome_file.is_some()
            && !self.drugs.is_empty()
        {
            out.push_str("Ready: type `submit` to run the analysis.\n");
        }
        Ok(out)
    }

    fn toggle_section(&mut self, args: &[String]) -> Result<String, PharmaGuardError> {
        let [card, section] = args else {
            return Err(PharmaGuardError::InvalidArgument(
                "Usage: toggle <card> <variants|explanation>".into(),
            ));
        };
        let cards = self.current_report()?.analyses().len();
        let index = card
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=cards).contains(n))
            .ok_or_else(|| {
                PharmaGuardError::InvalidArgument(format!(
                    "Card must be a number between 1 and {cards}"
                ))
            })?
            - 1;
        self.sections.toggle(index, Section::parse(section)?);
        self.show()
    }

    fn expand(&mut self, args: &[String]) -> Result<String, PharmaGuardError> {
        let [sections] = args else {
            return Err(PharmaGuardError::InvalidArgument(
                "Usage: expand <variants|explanation|all>".into(),
            ));
        };
        let cards = self.current_report()?.analyses().len();
        for section in Section::parse_list(sections)? {
            self.sections.open_all(cards, section);
        }
        self.show()
    }

    fn current_report(&self) -> Result<&crate::entities::report::AnalysisReport, PharmaGuardError> {
        self.orchestrator.report().ok_or_else(|| {
            PharmaGuardError::InvalidArgument(format!(
                "No report to show; the analysis is {}",
                self.orchestrator.phase()
            ))
        })
    }
}

fn selection_line(drugs: &DrugSelection) -> String {
    if drugs.is_empty() {
        "-".to_string()
    } else {
        drugs.joined()
    }
}

/// Reads commands from stdin until `quit` or end of input.
pub async fn run<S: AnalysisService>(mut session: ShellSession<S>) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"PharmaGuard interactive session. Type `help` for commands.\n")
        .await?;
    loop {
        stdout.write_all(PROMPT.as_bytes()).await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match session.handle(&line).await {
            Ok(Reply::Output(text)) => stdout.write_all(text.as_bytes()).await?,
            Ok(Reply::Quit) => break,
            Err(err) => {
                warn!("shell command failed: {err}");
                stdout.write_all(format!("Error: {err}\n").as_bytes()).await?;
            }
        }
    }
    stdout.flush().await?;
    Ok(())
}
