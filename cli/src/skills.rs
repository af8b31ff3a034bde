use anyhow::{Context, Result};
use console::style;
use skillvault_core::catalog::SkillCatalog;
use skillvault_core::config::Config;
use skillvault_core::store::{ArtifactKind, INDEX_DIR, RecordStore, artifact_name};
use skillvault_core::{
    CatalogStats, LlmDescriber, LocalVectorIndex, ReconcileOutcome, SkillRecord, create_embedder,
    create_provider, load_primitives,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(clap::Subcommand, Clone, Debug)]
pub enum SkillsCommands {
    /// List current skills
    List {
        #[arg(short, long)]
        by: Option<String>,
    },
    /// Show counts by writer and success totals
    Stats,
    /// Find skills relevant to a task
    Search { query: String },
    /// Print a skill's code, optionally a superseded version
    Show {
        name: String,
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        version: Option<u32>,
    },
    /// Add a skill from a code file
    Add {
        entry_point: String,
        file: PathBuf,
        #[arg(short, long, default_value = "")]
        task: String,
    },
    /// Record a skill execution outcome
    Record {
        name: String,
        #[arg(long, conflicts_with = "failure")]
        success: bool,
        #[arg(long)]
        failure: bool,
    },
    /// Import skills from a legacy single-writer skill directory
    Migrate {
        source: PathBuf,
        #[arg(long, default_value = "legacy")]
        attribute_to: String,
    },
    /// Rebuild the vector index if it diverged from the records
    Reconcile,
}

pub async fn handle_command(command: SkillsCommands, config: &Config) -> Result<()> {
    match command {
        SkillsCommands::List { by } => list_skills(config, by.as_deref()).await,
        SkillsCommands::Stats => show_stats(config).await,
        SkillsCommands::Search { query } => search_skills(config, &query).await,
        SkillsCommands::Show { name, version } => show_skill(config, &name, version).await,
        SkillsCommands::Add {
            entry_point,
            file,
            task,
        } => add_skill(config, &entry_point, file, &task).await,
        SkillsCommands::Record {
            name,
            success,
            failure,
        } => {
            if success == failure {
                anyhow::bail!("Pass exactly one of --success or --failure");
            }
            let mut catalog = open_catalog(config).await?;
            catalog.record_result(&name, success).await?;
            println!("{} Recorded result for {}", style("✓").green().bold(), name);
            Ok(())
        }
        SkillsCommands::Migrate {
            source,
            attribute_to,
        } => migrate(config, source, &attribute_to).await,
        SkillsCommands::Reconcile => {
            let catalog = open_catalog(config).await?;
            match catalog.reconcile().await? {
                ReconcileOutcome::InSync => {
                    println!("{} Index in sync ({} skills)", style("✓").green().bold(), catalog.len());
                }
                ReconcileOutcome::Rebuilt {
                    indexed_before,
                    indexed_after,
                } => println!(
                    "{} Index rebuilt: {} -> {} entries",
                    style("✓").green().bold(),
                    indexed_before,
                    indexed_after
                ),
            }
            Ok(())
        }
    }
}

async fn open_catalog(config: &Config) -> Result<SkillCatalog> {
    let provider = create_provider(config)?;
    let describer =
        LlmDescriber::new(provider, config.model.clone()).with_temperature(config.temperature);
    let embedder = create_embedder(config)?;
    let index = LocalVectorIndex::open(&config.catalog.root_dir.join(INDEX_DIR), embedder).await?;
    let primitives = match &config.catalog.primitives_dir {
        Some(dir) => load_primitives(dir).await?,
        None => Vec::new(),
    };

    Ok(SkillCatalog::open(
        config.catalog.clone(),
        Arc::new(describer),
        Arc::new(index),
        primitives,
    )
    .await?)
}

/// Reads the records without creating, sweeping or quarantining anything.
async fn load_records(config: &Config) -> Result<(RecordStore, skillvault_core::SkillMap)> {
    let store = RecordStore::open_read_only(&config.catalog);
    let skills = store.load().await?;
    Ok((store, skills))
}

async fn list_skills(config: &Config, writer: Option<&str>) -> Result<()> {
    let (_, skills) = load_records(config).await?;
    let skills: Vec<(&String, &SkillRecord)> = skills
        .iter()
        .filter(|(_, r)| writer.is_none_or(|w| r.created_by == w))
        .collect();

    if skills.is_empty() {
        println!("{} No skills in {}", style("!").yellow(), config.catalog.root_dir.display());
        return Ok(());
    }

    println!("{} Skills ({})", style("✓").green().bold(), skills.len());
    println!();

    for (name, record) in skills {
        println!(
            "  {} {} by {}",
            style(name).white().bold(),
            style(format!("v{}", record.version)).dim(),
            record.created_by_name
        );
        println!(
            "    {} ok / {} failed, created {}",
            record.success_count, record.fail_count, record.created_at
        );
        if let Some(source) = &record.migrated_from {
            println!("    Migrated from: {}", source);
        }
    }

    Ok(())
}

async fn show_stats(config: &Config) -> Result<()> {
    let (_, skills) = load_records(config).await?;
    let stats = CatalogStats::from_skills(&skills);

    println!("{} {} skills", style("✓").green().bold(), stats.total_skills);
    for (writer, count) in &stats.by_writer {
        println!("  {:<20} {}", writer, count);
    }
    println!(
        "  successes: {}  failures: {}",
        stats.total_successes, stats.total_failures
    );
    Ok(())
}

async fn search_skills(config: &Config, query: &str) -> Result<()> {
    let catalog = open_catalog(config).await?;
    let hits = catalog.search(query).await?;

    if hits.is_empty() {
        println!("{} No matching skills", style("!").yellow());
        return Ok(());
    }

    for hit in hits {
        println!(
            "  {} {} by {}",
            style(format!("{:.3}", hit.score)).cyan(),
            style(&hit.name).white().bold(),
            hit.created_by
        );
    }
    Ok(())
}

async fn show_skill(config: &Config, name: &str, version: Option<u32>) -> Result<()> {
    let (store, skills) = load_records(config).await?;

    let code = match version {
        Some(v) => {
            let artifact =
                artifact_name(name, v).with_context(|| format!("Invalid version {}", v))?;
            store
                .read_artifact(ArtifactKind::Code, &artifact)
                .await?
                .with_context(|| format!("No artifact for {} v{}", name, v))?
        }
        None => skills
            .get(name)
            .map(|r| r.code.clone())
            .with_context(|| format!("Skill not found: {}", name))?,
    };

    let versions = store.artifact_versions(name).await?;
    if !versions.is_empty() {
        let listed: Vec<String> = versions.iter().map(|v| format!("v{v}")).collect();
        println!("{} {}", style("Versions on disk:").dim(), listed.join(", "));
    }
    println!("{}", code);
    Ok(())
}

async fn add_skill(config: &Config, entry_point: &str, file: PathBuf, task: &str) -> Result<()> {
    let code = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut catalog = open_catalog(config).await?;

    match catalog.add_skill(task, entry_point, &code).await? {
        Some(added) => println!(
            "{} Saved {} (v{}) as {}",
            style("✓").green().bold(),
            added.name,
            added.version,
            added.artifact
        ),
        None => println!("{} Task excluded, nothing stored", style("!").yellow()),
    }
    Ok(())
}

async fn migrate(config: &Config, source: PathBuf, writer: &str) -> Result<()> {
    if !source.exists() {
        anyhow::bail!("Source path does not exist: {}", source.display());
    }
    let mut catalog = open_catalog(config).await?;
    let report = catalog.import_legacy(&source, writer).await?;

    println!("{} Migration complete", style("✓").green().bold());
    println!("  Migrated: {}", report.migrated);
    println!("  Skipped:  {} (already existed)", report.skipped);
    println!("  Total:    {}", report.total);
    Ok(())
}
