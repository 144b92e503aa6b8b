use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};

use oralscreen::annotations::codec;
use oralscreen::config::AppConfig;
use oralscreen::domain::{SlotId, Status, SubmissionFilter};
use oralscreen::intake::{self, IntakeForm};
use oralscreen::session::{AnnotationSession, Intent, SessionSettings};
use oralscreen::store::{DirStore, SubmissionStore};

#[derive(Parser, Debug)]
#[command(name = "oralscreen", version, about = "Dental photo annotation and screening reports")]
struct Cli {
    /// Data directory (overrides the configured one)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a submission from a patient and three photos
    Intake {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        upper: PathBuf,
        #[arg(long)]
        front: PathBuf,
        #[arg(long)]
        lower: PathBuf,
    },
    /// Replace a slot's shapes with a JSON shape list and save the flattened image
    Annotate {
        id: String,
        #[arg(long, value_enum)]
        slot: SlotArg,
        /// JSON file holding the shape list
        #[arg(long)]
        shapes: PathBuf,
    },
    /// Set treatment recommendations as LABEL=TEXT pairs
    Recommend {
        id: String,
        #[arg(value_parser = parse_pair, required = true)]
        entries: Vec<(String, String)>,
    },
    /// Generate the PDF screening report
    Report {
        id: String,
        /// Copy the stored report here as well
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print a submission as JSON
    Show { id: String },
    /// List submissions, newest first
    List {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        /// Only submissions for this patient email
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print submission counts per status and the most recent ones
    Stats,
    /// Print the effective configuration, optionally writing it to the config file
    Config {
        #[arg(long)]
        write: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StatusArg {
    Uploaded,
    Annotated,
    Reported,
}

impl From<StatusArg> for Status {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Uploaded => Status::Uploaded,
            StatusArg::Annotated => Status::Annotated,
            StatusArg::Reported => Status::Reported,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SlotArg {
    Upper,
    Front,
    Lower,
}

impl From<SlotArg> for SlotId {
    fn from(slot: SlotArg) -> Self {
        match slot {
            SlotArg::Upper => SlotId::UpperTeeth,
            SlotArg::Front => SlotId::FrontTeeth,
            SlotArg::Lower => SlotId::LowerTeeth,
        }
    }
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    let (label, text) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=TEXT, got '{s}'"))?;
    if label.trim().is_empty() {
        return Err("label must not be empty".to_string());
    }
    Ok((label.trim().to_string(), text.trim().to_string()))
}

async fn read_photo(path: &Path) -> anyhow::Result<Option<Vec<u8>>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(Some(bytes))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = AppConfig::load();
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data_dir());
    let store = DirStore::open(&data_dir)
        .await
        .with_context(|| format!("opening data directory {}", data_dir.display()))?;
    let settings = SessionSettings::from(&config);

    match cli.command {
        Command::Intake {
            name,
            email,
            note,
            upper,
            front,
            lower,
        } => {
            let form = IntakeForm { name, email, note };
            let photos = [
                read_photo(&upper).await?,
                read_photo(&front).await?,
                read_photo(&lower).await?,
            ];
            let submission = intake::submit(&form, photos, &store).await?;
            println!("{}", submission.id);
        }
        Command::Annotate { id, slot, shapes } => {
            let json = tokio::fs::read_to_string(&shapes)
                .await
                .with_context(|| format!("reading {}", shapes.display()))?;
            let shapes = codec::decode_json(&json)?;
            let slot = SlotId::from(slot);

            let mut session = AnnotationSession::open(Arc::new(store), &id, settings).await?;
            session.switch_slot(slot)?;
            if let Err(err) = session.load_background().await {
                log::warn!("Flattening {} without a background: {}", slot, err);
            }
            session.replace_shapes(&shapes)?;
            session.save().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(session.submission().slot(slot))?
            );
        }
        Command::Recommend { id, entries } => {
            let mut session = AnnotationSession::open(Arc::new(store), &id, settings).await?;
            for (label, text) in entries {
                session.handle(Intent::SetRecommendation { label, text })?;
            }
            session.save_recommendations().await?;
            println!("{}", serde_json::to_string_pretty(session.recommendations())?);
        }
        Command::Report { id, output } => {
            let mut session = AnnotationSession::open(Arc::new(store), &id, settings).await?;
            let report = session.generate_report().await?;
            let Some(stored) = DirStore::path_of(&report.url) else {
                bail!("unexpected report location {}", report.url);
            };
            if let Some(output) = output {
                tokio::fs::copy(&stored, &output)
                    .await
                    .with_context(|| format!("writing {}", output.display()))?;
                println!("{}", output.display());
            } else {
                println!("{}", stored.display());
            }
        }
        Command::Show { id } => {
            let submission = store.get_submission(&id).await?;
            println!("{}", serde_json::to_string_pretty(&submission)?);
        }
        Command::List {
            status,
            email,
            page,
            limit,
        } => {
            let filter = SubmissionFilter {
                status: status.map(Status::from),
                email,
                page,
                limit,
            };
            let listing = store.list_submissions(&filter).await?;
            for submission in &listing.submissions {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    submission.id,
                    submission.status,
                    submission.submitted_at.format("%Y-%m-%d %H:%M"),
                    submission.patient.name,
                    submission.patient.email
                );
            }
            println!(
                "page {} of {} ({} submissions)",
                listing.page,
                listing.pages.max(1),
                listing.total
            );
        }
        Command::Config { write } => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if write {
                let path = config.save().context("writing configuration")?;
                println!("{}", path.display());
            }
        }
        Command::Stats => {
            let stats = store.submission_stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
