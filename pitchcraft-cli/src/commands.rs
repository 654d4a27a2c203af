//! CLI subcommand handlers.

use anyhow::Context;
use pitchcraft_core::config::{ModelKind, PipelineConfig, load_config};
use pitchcraft_core::persistence;
use pitchcraft_core::providers::{self, HeuristicModel, LanguageModel, SearchProvider};
use pitchcraft_core::research::{ResearchCallback, ResearchTask};
use pitchcraft_core::templates::{SlotKind, all_templates};
use pitchcraft_core::{
    Branding, ClientPreferences, PipelineCallback, PipelineStage, ProposalDraft, ProposalPipeline,
    RfpInput,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{Commands, ConfigAction, RunArgs};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => handle_run(args, workspace, quiet).await,
        Commands::Templates => {
            print_templates();
            Ok(())
        }
        Commands::Inspect { draft } => handle_inspect(draft, workspace),
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn load_workspace_config(workspace: &Path) -> anyhow::Result<PipelineConfig> {
    let config = load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    config.validate()?;
    Ok(config)
}

/// Prints stage progress to stderr.
struct CliProgress {
    quiet: bool,
}

impl ResearchCallback for CliProgress {
    fn on_task_complete(&self, task: &ResearchTask, completed: usize, total: usize) {
        if !self.quiet {
            eprintln!(
                "  [{completed}/{total}] {} {}",
                task.question.template, task.state
            );
        }
    }

    fn on_timeout(&self) {
        eprintln!("  Research timed out; unfinished questions are marked unresolved.");
    }
}

impl PipelineCallback for CliProgress {
    fn on_stage(&self, stage: PipelineStage) {
        if !self.quiet {
            eprintln!("> {stage}");
        }
    }

    fn on_requirements(&self, requirements: &[pitchcraft_core::RequirementItem]) {
        if !self.quiet {
            eprintln!("  {} requirements", requirements.len());
        }
    }
}

pub(crate) fn preferences(args: &RunArgs) -> ClientPreferences {
    let mut prefs = ClientPreferences::new(&args.client, &args.title)
        .with_tone(args.tone)
        .with_keywords(args.emphasis.iter().map(String::as_str))
        .with_branding(Branding {
            author_team: args.team.clone(),
            accent_color: args.accent.clone(),
            logo_url: None,
        });
    prefs.prepared_on = args.prepared_on;
    prefs
}

async fn handle_run(args: RunArgs, workspace: &Path, quiet: bool) -> anyhow::Result<()> {
    let config = load_workspace_config(workspace)?;

    let text = std::fs::read_to_string(&args.rfp)
        .with_context(|| format!("reading RFP {}", args.rfp.display()))?;
    let mut input = RfpInput::new(text).with_tier(args.tier);
    if let Some(path) = &args.summary {
        let summary = std::fs::read_to_string(path)
            .with_context(|| format!("reading summary {}", path.display()))?;
        input = input.with_summary(summary);
    }
    let prefs = preferences(&args);

    let pipeline = if args.dry_run {
        let model: Arc<dyn LanguageModel> = Arc::new(HeuristicModel::new());
        let search: Vec<Arc<dyn SearchProvider>> = Vec::new();
        ProposalPipeline::new(config, search, model)
    } else {
        if config.providers.model.kind == ModelKind::Heuristic && !quiet {
            eprintln!(
                "  Using the offline heuristic model (set providers.model.kind to use an LLM)."
            );
        }
        let search = providers::build_search_providers(
            &config.providers.search,
            config.research.provider_timeout(),
        )?;
        let model = providers::build_language_model(&config.providers.model)?;
        ProposalPipeline::new(config, search, model)
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing with the research gathered so far");
            ctrl_c.cancel();
        }
    });

    let progress = CliProgress { quiet };
    let draft = pipeline
        .run_with_callback(&input, &prefs, &cancel, &progress)
        .await?;

    let out = args
        .out
        .clone()
        .unwrap_or_else(|| persistence::draft_path(workspace, draft.run_id));
    draft.save(&out)?;

    print_slides(&draft);
    print_manifest(&draft);
    println!("\nDraft written to {}", out.display());
    Ok(())
}

fn handle_inspect(path: Option<PathBuf>, workspace: &Path) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => persistence::list_drafts(workspace)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No saved drafts in {}", workspace.display()))?,
    };
    let draft = ProposalDraft::load(&path)?;
    println!(
        "Draft {} for {}: \"{}\" ({} tier, {})",
        draft.run_id,
        draft.preferences.client_name,
        draft.preferences.project_title,
        draft.depth_tier,
        draft.created_at.format("%Y-%m-%d %H:%M UTC"),
    );
    print_slides(&draft);
    print_manifest(&draft);
    print_summary(&draft);
    print_references(&draft);
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".pitchcraft");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            let toml_str = PipelineConfig::default().to_toml()?;
            persistence::atomic_write(&config_path, toml_str.as_bytes())?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_workspace_config(workspace)?;
            println!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn print_templates() {
    println!("{:<3} {:<22} {:<24} {:<9} Slots", "#", "Id", "Title", "Research");
    for template in all_templates() {
        let slots: Vec<String> = template
            .slots
            .iter()
            .map(|s| match s.kind {
                SlotKind::ChartSeries => format!("{} (chart)", s.name),
                SlotKind::TableRows => format!("{} (table)", s.name),
                _ => s.name.to_string(),
            })
            .collect();
        println!(
            "{:<3} {:<22} {:<24} {:<9} {}",
            template.kind.index() + 1,
            template.kind.id(),
            template.title,
            if template.research_required { "yes" } else { "no" },
            slots.join(", ")
        );
    }
}

fn print_slides(draft: &ProposalDraft) {
    println!("\nSlides:");
    for (i, slide) in draft.slides.iter().enumerate() {
        println!(
            "  {:>2}. {:<28} {:<10} {} source(s)",
            i + 1,
            slide.title,
            slide.status,
            slide.source_refs.len()
        );
    }
    if draft.research_timed_out {
        println!("  (research hit the run timeout)");
    }
}

fn print_manifest(draft: &ProposalDraft) {
    let manifest = draft.unresolved_manifest();
    if manifest.is_empty() {
        println!("\nNo unresolved slots.");
        return;
    }
    println!("\nNeeds review ({} slide(s)):", manifest.len());
    for entry in manifest {
        println!(
            "  slide {} [{}]: {} ({})",
            entry.position,
            entry.template,
            entry.slots.join(", "),
            entry.reason
        );
    }
}

fn print_summary(draft: &ProposalDraft) {
    println!("\nRequirements:");
    for row in draft.summary_rows() {
        let templates: Vec<&str> = row.templates.iter().map(|t| t.id()).collect();
        println!(
            "  {} {:<10} {} -> {}",
            row.requirement_id,
            row.status,
            pitchcraft_core::text::truncate_chars(&row.requirement, 60),
            templates.join(", ")
        );
    }
}

fn print_references(draft: &ProposalDraft) {
    let references = draft.references();
    if references.is_empty() {
        return;
    }
    println!("\nReferences:");
    for (i, r) in references.iter().enumerate() {
        println!(
            "  [{}] {} ({}, via {}, {:.2})",
            i + 1,
            r.title,
            r.url,
            r.provider,
            r.confidence
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitchcraft_core::{DepthTier, Tone};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn args() -> RunArgs {
        RunArgs {
            rfp: PathBuf::from("rfp.txt"),
            summary: None,
            tier: DepthTier::Default,
            client: "Acme".into(),
            title: "Migration".into(),
            tone: Tone::Technical,
            emphasis: vec![" security ".into(), "".into(), "cost".into()],
            team: Some("Northwind".into()),
            accent: None,
            prepared_on: None,
            out: None,
            dry_run: true,
        }
    }

    #[test]
    fn test_preferences_from_args() {
        let prefs = preferences(&args());
        assert_eq!(prefs.tone, Tone::Technical);
        assert_eq!(prefs.emphasis_keywords, vec!["security", "cost"]);
        assert_eq!(prefs.branding.author_team.as_deref(), Some("Northwind"));
    }

    #[tokio::test]
    async fn test_dry_run_writes_draft() {
        let dir = TempDir::new().unwrap();
        let rfp = dir.path().join("rfp.txt");
        std::fs::write(
            &rfp,
            "- The vendor must migrate the dispatch platform to a managed cloud environment.\n\
             - The total cost must not exceed $450,000 including licences.\n",
        )
        .unwrap();
        let out = dir.path().join("draft.json");
        let mut args = args();
        args.rfp = rfp;
        args.out = Some(out.clone());

        handle_run(args, dir.path(), true).await.unwrap();
        let draft = ProposalDraft::load(&out).unwrap();
        assert_eq!(draft.preferences.client_name, "Acme");
        assert!(!draft.unresolved_manifest().is_empty());
    }

    #[test]
    fn test_config_init_then_show() {
        let dir = TempDir::new().unwrap();
        handle_config(ConfigAction::Init, dir.path()).unwrap();
        assert!(dir.path().join(".pitchcraft/config.toml").exists());
        handle_config(ConfigAction::Show, dir.path()).unwrap();
    }

    #[test]
    fn test_inspect_without_drafts_fails() {
        let dir = TempDir::new().unwrap();
        assert!(handle_inspect(None, dir.path()).is_err());
    }
}
