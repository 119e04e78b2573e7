//! Top-level CLI parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::Settings;
use crate::entities::report::AnalysisReport;
use crate::entities::request::{DrugSelection, GenomeFile};
use crate::error::PharmaGuardError;
use crate::export::ExportService;
use crate::render::markdown::{RenderOptions, failure_markdown, report_markdown};
use crate::session::orchestrator::{Phase, RequestOrchestrator};
use crate::session::sections::{Section, SectionToggleStore};
use crate::sources::analysis::{AnalysisClient, SupportedDrugs};

pub mod health;
pub mod list;
pub mod shell;

#[derive(Parser, Debug)]
#[command(
    name = "pharmaguard",
    about = "Pharmacogenomic drug-risk reports from a genome VCF file",
    version,
    after_help = "Reports are for research use only and do not replace clinical judgment."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON instead of Markdown
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Analysis service base URL (default: $PHARMAGUARD_API_URL or http://localhost:8000)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Directory for downloaded reports (default: $PHARMAGUARD_EXPORT_DIR or the download dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a genome file against one or more drugs
    #[command(after_help = "\
EXAMPLES:
  pharmaguard analyze patient.vcf --drugs WARFARIN,CODEINE
  pharmaguard analyze patient.vcf --drug clopidogrel --expand all --download")]
    Analyze {
        /// Genome file (.vcf)
        vcf: PathBuf,
        /// Comma-separated drug names
        #[arg(short, long, value_name = "DRUGS")]
        drugs: Option<String>,
        /// Single drug name (repeatable)
        #[arg(long = "drug", value_name = "DRUG")]
        drug: Vec<String>,
        /// Sections to open on every card (variants, explanation, all)
        #[arg(short, long, value_name = "SECTIONS")]
        expand: Option<String>,
        /// Save the report JSON into the export directory
        #[arg(long)]
        download: bool,
        /// Copy the report JSON to the clipboard
        #[arg(long)]
        copy: bool,
        /// Send the rendered report to the printer
        #[arg(long)]
        print: bool,
    },
    /// Re-render a downloaded report JSON file
    Render {
        /// Report JSON file
        file: PathBuf,
        /// Sections to open on every card (variants, explanation, all)
        #[arg(short, long, value_name = "SECTIONS")]
        expand: Option<String>,
    },
    /// Interactive session
    Shell,
    /// Drugs and genes supported by the analysis service
    Drugs,
    /// Reference of the CPIC drugs and their primary genes
    List {
        /// Optional drug name (e.g., WARFARIN)
        drug: Option<String>,
    },
    /// Check analysis service connectivity and the export directory
    Health {
        /// Check the analysis service only
        #[arg(long)]
        api_only: bool,
    },
    /// Show version
    Version,
}

fn version_output() -> String {
    let cargo_version = env!("CARGO_PKG_VERSION");
    let git_tag = option_env!("PHARMAGUARD_BUILD_GIT_TAG");
    let git = option_env!("PHARMAGUARD_BUILD_GIT_SHA").unwrap_or("unknown");
    let build = option_env!("PHARMAGUARD_BUILD_DATE").unwrap_or("unknown");
    let version = git_tag
        .filter(|t| t.starts_with('v') && !t.contains('-'))
        .map(|t| &t[1..])
        .unwrap_or(cargo_version);
    format!("pharmaguard {version} (git {git}, build {build})")
}

fn drug_selection(csv: Option<&str>, single: &[String]) -> Result<DrugSelection, PharmaGuardError> {
    let mut selection = DrugSelection::from_csv(csv.unwrap_or_default())?;
    for drug in single {
        if !selection.contains(drug) {
            selection.toggle(drug)?;
        }
    }
    Ok(selection)
}

fn expanded_sections(
    expand: Option<&str>,
    report: &AnalysisReport,
) -> Result<SectionToggleStore, PharmaGuardError> {
    let mut store = SectionToggleStore::new();
    if let Some(expand) = expand {
        for section in Section::parse_list(expand)? {
            store.open_all(report.analyses().len(), section);
        }
    }
    Ok(store)
}

/// Best-effort exports. Failures are logged and listed; they never fail the command.
async fn run_exports(
    export: &ExportService,
    report: &AnalysisReport,
    plain: &str,
    download: bool,
    copy: bool,
    print: bool,
) -> Vec<String> {
    let mut notes = Vec::new();
    if download {
        match export.trigger_download(report).await {
            Ok(path) => notes.push(format!("Saved {}", path.display())),
            Err(err) => {
                warn!("download failed: {err}");
                notes.push(format!("Download failed: {err}"));
            }
        }
    }
    if copy {
        match export.copy_to_clipboard(report).await {
            Ok(tool) => notes.push(format!("Copied to clipboard ({tool})")),
            Err(err) => {
                warn!("copy failed: {err}");
                notes.push(format!("Copy failed: {err}"));
            }
        }
    }
    if print {
        match export.trigger_print(plain).await {
            Ok(tool) => notes.push(format!("Sent to printer ({tool})")),
            Err(err) => {
                warn!("print failed: {err}");
                notes.push(format!("Print failed: {err}"));
            }
        }
    }
    notes
}

fn supported_drugs_markdown(supported: &SupportedDrugs) -> String {
    let mut out = String::from("# Supported Drugs\n\n| Drug | Gene |\n|------|------|\n");
    for name in &supported.drugs {
        let gene = crate::entities::drug::find(name).map_or("-", |d| d.gene);
        out.push_str(&format!("| {name} | {gene} |\n"));
    }
    if !supported.genes.is_empty() {
        out.push_str(&format!("\nGenes: {}\n", supported.genes.join(", ")));
    }
    out
}

pub async fn run(cli: Cli) -> anyhow::Result<String> {
    let settings = Settings::resolve(
        cli.api_url.as_deref(),
        cli.export_dir.as_deref(),
        cli.no_color,
    );

    match cli.command {
        Commands::Analyze {
            vcf,
            drugs,
            drug,
            expand,
            download,
            copy,
            print,
        } => {
            let selection = drug_selection(drugs.as_deref(), &drug)?;
            let genome_file = GenomeFile::load(&vcf).await?;
            let client = AnalysisClient::with_base(settings.api_url.clone())?;
            let mut orchestrator = RequestOrchestrator::new(client);

            if orchestrator.submit(Some(&genome_file), &selection).await? != Phase::Success {
                let banner = orchestrator
                    .failure()
                    .map(failure_markdown)
                    .unwrap_or_default();
                anyhow::bail!("{}", banner.trim_end());
            }
            let Some(report) = orchestrator.report() else {
                anyhow::bail!("analysis finished without a report");
            };

            let sections = expanded_sections(expand.as_deref(), report)?;
            let plain = report_markdown(report, &sections, RenderOptions { color: false })?;
            let export = ExportService::new(&settings.export_dir);
            let notes = run_exports(&export, report, &plain, download, copy, print).await;

            if cli.json {
                for note in &notes {
                    info!("{note}");
                }
                return Ok(crate::export::serialize(report)?);
            }
            let mut out = if settings.color {
                report_markdown(report, &sections, RenderOptions { color: true })?
            } else {
                plain
            };
            if !notes.is_empty() {
                out.push('\n');
                for note in notes {
                    out.push_str(&note);
                    out.push('\n');
                }
            }
            Ok(out)
        }
        Commands::Render { file, expand } => {
            let text = tokio::fs::read_to_string(&file).await?;
            let raw: serde_json::Value = serde_json::from_str(&text)?;
            let report = AnalysisReport::from_value(raw)?;
            if cli.json {
                return Ok(crate::export::serialize(&report)?);
            }
            let sections = expanded_sections(expand.as_deref(), &report)?;
            Ok(report_markdown(
                &report,
                &sections,
                RenderOptions {
                    color: settings.color,
                },
            )?)
        }
        Commands::Shell => {
            let client = AnalysisClient::with_base(settings.api_url.clone())?;
            let session = shell::ShellSession::new(
                client,
                ExportService::new(&settings.export_dir),
                settings.color,
            );
            shell::run(session).await?;
            Ok(String::new())
        }
        Commands::Drugs => {
            let supported = AnalysisClient::with_base(settings.api_url.clone())?
                .supported_drugs()
                .await?;
            if cli.json {
                Ok(crate::render::json::to_pretty(&supported)?)
            } else {
                Ok(supported_drugs_markdown(&supported))
            }
        }
        Commands::List { drug } => {
            if cli.json {
                let drugs: Vec<_> = match drug.as_deref() {
                    Some(name) => crate::entities::drug::find(name).into_iter().collect(),
                    None => crate::entities::drug::CATALOG.iter().collect(),
                };
                if drugs.is_empty() {
                    list::render(drug.as_deref())?;
                }
                return Ok(crate::render::json::to_pretty(&drugs)?);
            }
            list::render(drug.as_deref()).map_err(Into::into)
        }
        Commands::Health { api_only } => {
            let client = AnalysisClient::with_base(settings.api_url.clone())?;
            let report = health::check(&client, &settings.export_dir, api_only).await?;
            if cli.json {
                Ok(crate::render::json::to_pretty(&report)?)
            } else {
                Ok(report.to_markdown())
            }
        }
        Commands::Version => Ok(version_output()),
    }
}

/// Parses `args` (program name first) and runs the command.
///
/// # Errors
///
/// Returns an error when CLI args cannot be parsed or when command execution fails.
pub async fn execute(mut args: Vec<String>) -> anyhow::Result<String> {
    if args.is_empty() {
        args.push("pharmaguard".to_string());
    }
    let cli = Cli::try_parse_from(args)?;
    run(cli).await
}
