mod commands;
mod display;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fiscalsheet_core::config::DEFAULT_CONFIG_FILE;
use fiscalsheet_core::{AppConfig, AuthContext, CaseFold};
use fiscalsheet_extract::ContractPattern;
use tracing::Level;

use crate::commands::{BudgetTarget, ReconcileJob, Target};

#[derive(Parser, Debug)]
#[command(
    name = "fiscalsheet",
    version,
    about = "Apply appointment orders to fiscal assignment spreadsheets"
)]
struct Cli {
    /// Configuration file (created with defaults when missing).
    #[arg(long, global = true, env = "FISCALSHEET_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that HTML files are appointment orders citing a contract.
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        extract: ExtractArgs,
    },
    /// Apply appointment orders to an assignment spreadsheet.
    Reconcile(ReconcileArgs),
    /// Refresh budget spreadsheets from a commitment-note report.
    Budget(BudgetArgs),
    /// Remote file operations.
    #[command(subcommand)]
    Files(FilesCommand),
    /// Show or edit the configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Only accept contract numbers right after "nº".
    #[arg(long)]
    strict: bool,
}

impl ExtractArgs {
    fn pattern(&self) -> ContractPattern {
        if self.strict {
            ContractPattern::Strict
        } else {
            ContractPattern::Lenient
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Fold {
    Lower,
    Upper,
}

impl From<Fold> for CaseFold {
    fn from(fold: Fold) -> Self {
        match fold {
            Fold::Lower => CaseFold::Lower,
            Fold::Upper => CaseFold::Upper,
        }
    }
}

#[derive(Args, Debug)]
struct ReconcileArgs {
    /// Appointment order HTML files.
    files: Vec<PathBuf>,

    /// Local assignment spreadsheet.
    #[arg(long, conflicts_with_all = ["region", "regions_dir"])]
    sheet: Option<PathBuf>,

    /// Write the updated spreadsheet here instead of over --sheet.
    #[arg(long, requires = "sheet")]
    out: Option<PathBuf>,

    /// Region whose remote spreadsheet receives the orders.
    #[arg(long, conflicts_with = "regions_dir")]
    region: Option<String>,

    /// Directory with one subdirectory of HTML files per region.
    #[arg(long)]
    regions_dir: Option<PathBuf>,

    /// Report without writing anything.
    #[arg(long)]
    dry_run: bool,

    /// Keep the names' capitalization as printed.
    #[arg(long)]
    keep_case: bool,

    /// Case used when comparing units and names.
    #[arg(long, value_enum, default_value_t = Fold::Lower)]
    fold: Fold,

    #[command(flatten)]
    extract: ExtractArgs,
}

impl ReconcileArgs {
    fn into_job(self) -> Result<ReconcileJob> {
        let target = match (self.sheet, self.region, self.regions_dir) {
            (Some(sheet), None, None) => Target::Local {
                sheet,
                out: self.out,
            },
            (None, Some(region), None) => Target::Region(region),
            (None, None, Some(dir)) => Target::AllRegions(dir),
            _ => bail!("pass one of --sheet, --region or --regions-dir"),
        };
        if self.files.is_empty() && !matches!(target, Target::AllRegions(_)) {
            bail!("no HTML files given");
        }
        Ok(ReconcileJob {
            files: self.files,
            target,
            options: commands::batch_options(
                self.extract.pattern(),
                self.keep_case,
                self.fold.into(),
            ),
            dry_run: self.dry_run,
        })
    }
}

#[derive(Args, Debug)]
struct BudgetArgs {
    /// Commitment-note report (.xlsx).
    #[arg(long)]
    report: PathBuf,

    /// Local budget spreadsheet.
    #[arg(long, conflicts_with = "remote")]
    sheet: Option<PathBuf>,

    /// Write the updated budget here instead of over --sheet.
    #[arg(long, requires = "sheet")]
    out: Option<PathBuf>,

    /// Remote budget file, by name in the budget folder or by id. Repeatable.
    #[arg(long)]
    remote: Vec<String>,

    /// Report without writing anything.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum FilesCommand {
    /// List a remote folder (the assignments folder by default).
    List {
        #[arg(long, conflicts_with = "budget")]
        folder: Option<String>,
        /// List the budget folder.
        #[arg(long)]
        budget: bool,
    },
    /// Delete a remote file.
    Delete {
        file_id: String,
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the configuration; secrets are masked unless authenticated.
    Show {
        #[command(flatten)]
        auth: AuthArgs,
    },
    /// Set one key, e.g. `PLANILHAS_FISCAIS.Sul <file id>`.
    Set {
        key: String,
        value: String,
        #[command(flatten)]
        auth: AuthArgs,
    },
}

#[derive(Args, Debug)]
struct AuthArgs {
    #[arg(long, env = "FISCALSHEET_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, env = "FISCALSHEET_ADMIN_SECRET", hide = true, hide_env_values = true)]
    admin_secret: Option<String>,
}

impl AuthArgs {
    fn login(&self) -> Result<Option<AuthContext>> {
        let Some(password) = &self.password else {
            return Ok(None);
        };
        let auth = AuthContext::login(password, self.admin_secret.as_deref())?;
        Ok(Some(auth))
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let json = cli.json;
    match cli.command {
        Command::Validate { files, extract } => {
            let all_valid = commands::validate_files(&files, extract.pattern(), json)?;
            if !all_valid {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Reconcile(args) => {
            let config = load_config(&cli.config)?;
            commands::reconcile(&config, args.into_job()?, json).await?;
        }
        Command::Budget(args) => {
            let config = load_config(&cli.config)?;
            let target = match (args.sheet, args.remote.is_empty()) {
                (Some(sheet), true) => BudgetTarget::Local {
                    sheet,
                    out: args.out,
                },
                (None, false) => BudgetTarget::Remote(args.remote),
                _ => bail!("pass either --sheet or at least one --remote"),
            };
            commands::budget(&config, &args.report, target, args.dry_run, json).await?;
        }
        Command::Files(FilesCommand::List { folder, budget }) => {
            let config = load_config(&cli.config)?;
            let folder = match folder {
                Some(folder) => folder,
                None if budget => config.budget_folder.clone(),
                None => config.assignments_folder.clone(),
            };
            commands::list_files(&config, &folder, json).await?;
        }
        Command::Files(FilesCommand::Delete { file_id, yes }) => {
            if !yes {
                bail!("refusing to delete {file_id} without --yes");
            }
            let config = load_config(&cli.config)?;
            commands::delete_file(&config, &file_id).await?;
        }
        Command::Config(ConfigCommand::Show { auth }) => {
            let auth = auth.login()?;
            commands::show_config(&cli.config, auth.as_ref(), json)?;
        }
        Command::Config(ConfigCommand::Set { key, value, auth }) => {
            let auth = auth
                .login()?
                .context("--password is required to edit the configuration")?;
            commands::set_config(&cli.config, &auth, &key, &value)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config(path: &std::path::Path) -> Result<AppConfig> {
    AppConfig::load_or_init(path).with_context(|| format!("loading config {}", path.display()))
}
