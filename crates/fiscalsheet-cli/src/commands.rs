//! Subcommand workflows: each loads its inputs, runs the library operation
//! and writes results back through a [`SpreadsheetStore`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fiscalsheet_core::{AppConfig, AuthContext, CaseFold, ConfigEditor, Dataset};
use fiscalsheet_extract::{ContractPattern, ExtractOptions, Validation, validate};
use fiscalsheet_reconcile::{
    BatchOptions, BatchReport, BudgetReport, Fragment, MergeOptions, run_batch, update_budget,
};
use fiscalsheet_store::{Formatter, LocalStore, SpreadsheetStore, read_workbook};
use fiscalsheet_sync::{DriveClient, DriveFile, DriveStore, OAuthCredentials};
use serde::Serialize;
use tracing::{info, warn};

use crate::display;

// ── Fragments ──

/// Read HTML fragments, named by file name.
pub fn read_fragments(paths: &[PathBuf]) -> Result<Vec<Fragment>> {
    paths
        .iter()
        .map(|path| {
            let html = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(Fragment::new(name, html))
        })
        .collect()
}

/// HTML files directly inside `dir`, sorted by name. A missing directory
/// yields no files.
pub fn html_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let is_html = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"));
        if is_html && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ── validate ──

#[derive(Serialize)]
struct NamedValidation<'a> {
    name: &'a str,
    #[serde(flatten)]
    validation: &'a Validation,
}

pub fn validate_files(paths: &[PathBuf], pattern: ContractPattern, json: bool) -> Result<bool> {
    let fragments = read_fragments(paths)?;
    let results: Vec<(String, Validation)> = fragments
        .iter()
        .map(|f| (f.name.clone(), validate(&f.html, pattern)))
        .collect();

    if json {
        let named: Vec<NamedValidation> = results
            .iter()
            .map(|(name, validation)| NamedValidation { name, validation })
            .collect();
        display::print_json(&named)?;
    } else {
        display::print_validations(&results);
    }
    Ok(results.iter().all(|(_, v)| v.valid))
}

// ── reconcile ──

/// Where the assignment spreadsheet lives and where it goes afterwards.
pub enum Target {
    Local { sheet: PathBuf, out: Option<PathBuf> },
    Region(String),
    AllRegions(PathBuf),
}

pub struct ReconcileJob {
    pub files: Vec<PathBuf>,
    pub target: Target,
    pub options: BatchOptions,
    pub dry_run: bool,
}

pub fn batch_options(pattern: ContractPattern, keep_case: bool, case: CaseFold) -> BatchOptions {
    BatchOptions {
        extract: ExtractOptions {
            contract_pattern: pattern,
            uppercase_names: !keep_case,
        },
        merge: MergeOptions { case },
    }
}

#[derive(Serialize)]
struct RegionReport<'a> {
    region: &'a str,
    uploaded: bool,
    #[serde(flatten)]
    report: &'a BatchReport,
}

pub async fn reconcile(config: &AppConfig, job: ReconcileJob, json: bool) -> Result<()> {
    match &job.target {
        Target::Local { sheet, out } => {
            let fragments = read_fragments(&job.files)?;
            let store = LocalStore::new();
            let handle = sheet.to_string_lossy();
            let mut dataset = store
                .load_dataset(&handle)
                .await
                .with_context(|| format!("loading {}", sheet.display()))?;
            let report = run_batch(&mut dataset, &config.layout, &fragments, &job.options)?;
            emit_batch(&sheet.display().to_string(), &report, json)?;

            if report.changed() && !job.dry_run {
                let target = out.as_deref().unwrap_or(sheet.as_path()).to_string_lossy();
                store
                    .save_dataset(&target, &dataset, &Formatter::default())
                    .await
                    .with_context(|| format!("writing {target}"))?;
                info!(path = %target, "spreadsheet updated");
            }
            Ok(())
        }
        Target::Region(region) => {
            let fragments = read_fragments(&job.files)?;
            let store = drive_store(config)?;
            let (report, uploaded) =
                reconcile_region(config, &store, region, &fragments, &job).await?;
            finish_regions(&[(region.clone(), report, uploaded)], json)
        }
        Target::AllRegions(root) => {
            // One subdirectory of HTML files per region.
            let mut pending = Vec::new();
            for region in config.regions() {
                let files = html_files(&root.join(region))?;
                if files.is_empty() {
                    continue;
                }
                pending.push((region.to_string(), read_fragments(&files)?));
            }
            if pending.is_empty() {
                bail!("no HTML files under {} for any region", root.display());
            }

            // Every fragment must validate before anything is downloaded.
            let invalid: Vec<(String, Validation)> = pending
                .iter()
                .flat_map(|(_, fragments)| fragments)
                .map(|f| (f.name.clone(), validate(&f.html, job.options.extract.contract_pattern)))
                .filter(|(_, v)| !v.valid)
                .collect();
            if !invalid.is_empty() {
                display::print_validations(&invalid);
                bail!("{} invalid appointment order(s); nothing was applied", invalid.len());
            }

            let store = drive_store(config)?;
            let mut reports = Vec::new();
            for (region, fragments) in &pending {
                let (report, uploaded) =
                    reconcile_region(config, &store, region, fragments, &job).await?;
                reports.push((region.clone(), report, uploaded));
            }
            finish_regions(&reports, json)
        }
    }
}

async fn reconcile_region(
    config: &AppConfig,
    store: &DriveStore,
    region: &str,
    fragments: &[Fragment],
    job: &ReconcileJob,
) -> Result<(BatchReport, bool)> {
    let file_id = config.sheet_for_region(region)?;
    info!(region, fragments = fragments.len(), "reconciling region");

    let mut dataset: Dataset = store
        .load_dataset(file_id)
        .await
        .with_context(|| format!("downloading spreadsheet for {region}"))?;
    let report = run_batch(&mut dataset, &config.layout, fragments, &job.options)?;

    let upload = report.changed() && !job.dry_run;
    if upload {
        store
            .save_dataset(file_id, &dataset, &Formatter::default())
            .await
            .with_context(|| format!("uploading spreadsheet for {region}"))?;
    }
    if !report.conflicts.is_empty() {
        warn!(region, conflicts = report.conflicts.len(), "contracts left unchanged");
    }
    Ok((report, upload))
}

fn finish_regions(reports: &[(String, BatchReport, bool)], json: bool) -> Result<()> {
    if json {
        let out: Vec<RegionReport> = reports
            .iter()
            .map(|(region, report, uploaded)| RegionReport {
                region,
                uploaded: *uploaded,
                report,
            })
            .collect();
        return display::print_json(&out);
    }
    for (region, report, uploaded) in reports {
        display::print_batch(region, report);
        if *uploaded {
            println!("Uploaded.");
        }
        println!();
    }
    Ok(())
}

fn emit_batch(title: &str, report: &BatchReport, json: bool) -> Result<()> {
    if json {
        display::print_json(report)
    } else {
        display::print_batch(title, report);
        Ok(())
    }
}

// ── budget ──

pub enum BudgetTarget {
    Local { sheet: PathBuf, out: Option<PathBuf> },
    /// Budget files on Drive, by name inside the budget folder or by id.
    Remote(Vec<String>),
}

#[derive(Serialize)]
struct NamedBudget<'a> {
    file: &'a str,
    #[serde(flatten)]
    report: &'a BudgetReport,
}

pub async fn budget(
    config: &AppConfig,
    report_path: &Path,
    target: BudgetTarget,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let bytes = std::fs::read(report_path)
        .with_context(|| format!("reading {}", report_path.display()))?;
    let report_book = read_workbook(&bytes)
        .with_context(|| format!("parsing {}", report_path.display()))?;
    let report_sheet = report_book
        .first()
        .context("commitment report has no sheets")?;
    let now = chrono::Local::now().naive_local();

    let mut results = Vec::new();
    match target {
        BudgetTarget::Local { sheet, out } => {
            let store = LocalStore::new();
            let handle = sheet.to_string_lossy();
            let mut book = store
                .load_workbook(&handle)
                .await
                .with_context(|| format!("loading {}", sheet.display()))?;
            let changes = update_budget(&mut book, report_sheet, now)?;
            if !dry_run {
                let target = out.as_deref().unwrap_or(sheet.as_path()).to_string_lossy();
                store
                    .save_workbook(&target, &book)
                    .await
                    .with_context(|| format!("writing {target}"))?;
            }
            results.push((sheet.display().to_string(), changes));
        }
        BudgetTarget::Remote(files) => {
            let store = drive_store(config)?;
            let listing = if config.budget_folder.is_empty() {
                Vec::new()
            } else {
                store.list_files(&config.budget_folder).await?
            };
            for file in &files {
                let id = resolve_file(&listing, file);
                let mut book = store
                    .load_workbook(id)
                    .await
                    .with_context(|| format!("downloading budget {file}"))?;
                let changes = update_budget(&mut book, report_sheet, now)?;
                if !dry_run {
                    store
                        .save_workbook(id, &book)
                        .await
                        .with_context(|| format!("uploading budget {file}"))?;
                }
                results.push((file.clone(), changes));
            }
        }
    }

    if json {
        let named: Vec<NamedBudget> = results
            .iter()
            .map(|(file, report)| NamedBudget { file, report })
            .collect();
        return display::print_json(&named);
    }
    for (file, report) in &results {
        display::print_budget(file, report);
    }
    Ok(())
}

/// File id for `name_or_id`: the id of the listed file with that name, or
/// the argument itself.
fn resolve_file<'a>(listing: &'a [DriveFile], name_or_id: &'a str) -> &'a str {
    listing
        .iter()
        .find(|f| f.name == name_or_id)
        .map(|f| f.id.as_str())
        .unwrap_or(name_or_id)
}

// ── files ──

pub async fn list_files(config: &AppConfig, folder: &str, json: bool) -> Result<()> {
    if folder.is_empty() {
        bail!("no folder id given or configured");
    }
    let store = drive_store(config)?;
    let files = store.list_files(folder).await?;
    if json {
        display::print_json(&files)
    } else {
        display::print_files(&files);
        Ok(())
    }
}

pub async fn delete_file(config: &AppConfig, file_id: &str) -> Result<()> {
    let store = drive_store(config)?;
    store
        .delete(file_id)
        .await
        .with_context(|| format!("deleting {file_id}"))?;
    println!("Deleted {file_id}.");
    Ok(())
}

// ── config ──

pub fn show_config(path: &Path, auth: Option<&AuthContext>, json: bool) -> Result<()> {
    let config = match auth {
        Some(auth) => ConfigEditor::open(auth, path)?.config().clone(),
        None => AppConfig::load_or_init(path)?.redacted(),
    };
    if json {
        display::print_json(&config)
    } else {
        display::print_config(&config);
        Ok(())
    }
}

pub fn set_config(path: &Path, auth: &AuthContext, key: &str, value: &str) -> Result<()> {
    let mut editor = ConfigEditor::open(auth, path)?;
    editor.set(key, value)?;
    editor.save()?;
    println!("{key} updated.");
    Ok(())
}

// ── Helpers ──

fn drive_store(config: &AppConfig) -> Result<DriveStore> {
    let credentials = OAuthCredentials::from_config(config)?;
    Ok(DriveStore::new(DriveClient::new(credentials)))
}
