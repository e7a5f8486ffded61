//! Wires configuration into the scheduler and guards the run with the
//! pre-flight checks: naming, contact address, output directory and
//! overwrite confirmation.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{Instrument, debug, info, info_span};

use crate::cli::RunArgs;
use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::fasta::{FastaReader, count_records};
use crate::launch::{CommandTemplate, JobFactory, Launcher};
use crate::naming::{DescriptionMode, NamingContext, NamingPolicy, looks_like_result};
use crate::scheduler::{BatchReport, ProgressSink, Scheduler, SchedulerConfig};
use crate::window::RecordWindow;

/// How many pre-existing result names are shown before asking to overwrite.
const EXISTING_EXAMPLES: usize = 5;

/// Asks the user a yes/no question.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> io::Result<bool>;
}

/// Answers yes to everything (`--yes`).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&mut self, _prompt: &str) -> io::Result<bool> {
        Ok(true)
    }
}

/// Fully resolved settings for one batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub fasta_file: PathBuf,
    pub out_dir: PathBuf,
    pub email: String,
    pub prefix: String,
    pub auto_number: bool,
    pub use_description: bool,
    pub description_mode: DescriptionMode,
    pub window: RecordWindow,
    pub output_format: Option<String>,
    pub scheduler: SchedulerConfig,
    pub command: CommandTemplate,
    pub dry_run: bool,
}

impl BatchOptions {
    /// Merge CLI arguments over the loaded configuration.
    pub fn resolve(args: &RunArgs, config: &BatchConfig) -> Result<Self, BatchError> {
        let window = RecordWindow::new(args.from_record, args.to_record)?;
        let scheduler = SchedulerConfig::new(
            args.max_jobs.unwrap_or(config.max_concurrent_jobs),
            args.poll.unwrap_or(config.polling_time),
        )?
        .with_launch_delay(Duration::from_millis(config.launch_delay_ms))
        .with_job_timeout(
            args.timeout
                .or(config.job_timeout_secs)
                .map(Duration::from_secs),
        );

        Ok(Self {
            fasta_file: args.fasta_file.clone(),
            out_dir: std::path::absolute(&args.out_dir)?,
            email: args.email.clone().unwrap_or_else(|| config.email.clone()),
            prefix: args.prefix.clone(),
            auto_number: !args.no_numbering,
            use_description: args.use_fasta_descriptions,
            description_mode: args.desc_mode,
            window,
            output_format: args
                .format
                .clone()
                .or_else(|| config.single_results_format.clone()),
            scheduler,
            command: config.command_template(),
            dry_run: args.dry_run,
        })
    }
}

/// A batch that passed every pre-flight check and is ready to launch.
pub struct PreparedBatch {
    options: BatchOptions,
    naming: NamingPolicy,
    total_records: usize,
}

/// Run the pre-flight checks. `Ok(None)` means the user declined a prompt and
/// nothing was changed on disk.
pub fn prepare(options: BatchOptions, confirm: &mut impl Confirm) -> Result<Option<PreparedBatch>> {
    if !options.auto_number && !options.use_description {
        return Err(BatchError::NamingDisabled.into());
    }
    if !options.dry_run && options.email.trim().is_empty() {
        return Err(BatchError::Config(
            "a contact email is required (argument or IPRBATCH_EMAIL)".into(),
        )
        .into());
    }

    let total_records = count_records(&options.fasta_file)
        .with_context(|| format!("failed to read {}", options.fasta_file.display()))?;
    info!(total_records, fasta = %options.fasta_file.display(), "counted records");

    let naming = NamingPolicy::new(NamingContext {
        prefix: options.prefix.clone(),
        auto_number: options.auto_number,
        use_description: options.use_description,
        description_transform: Some(Arc::new(options.description_mode)),
        total_record_count: total_records,
    })?;
    debug!(width = naming.zero_pad_width(), "numbering width");

    let records = FastaReader::open(&options.fasta_file)
        .with_context(|| format!("failed to open {}", options.fasta_file.display()))?;
    naming.check_names(options.window.apply(records))?;

    if !options.dry_run {
        if !ensure_out_dir(&options.out_dir, confirm)? {
            return Ok(None);
        }
        if !confirm_overwrite(&options.out_dir, &options.prefix, confirm)? {
            return Ok(None);
        }
    }

    Ok(Some(PreparedBatch {
        options,
        naming,
        total_records,
    }))
}

fn ensure_out_dir(out_dir: &Path, confirm: &mut impl Confirm) -> Result<bool> {
    if out_dir.is_dir() {
        return Ok(true);
    }
    let prompt = format!(
        "Results destination {} does not exist. Create results directory?",
        out_dir.display()
    );
    if !confirm.confirm(&prompt)? {
        info!("output directory creation declined");
        return Ok(false);
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    Ok(true)
}

fn confirm_overwrite(out_dir: &Path, prefix: &str, confirm: &mut impl Confirm) -> Result<bool> {
    let existing = existing_results(out_dir, prefix)?;
    if existing.is_empty() {
        return Ok(true);
    }

    let mut prompt = String::from("Possible results files found in results directory, e.g.:\n");
    for name in existing.iter().take(EXISTING_EXAMPLES) {
        prompt.push_str(&format!("  {name}\n"));
    }
    prompt.push_str("Files may be overwritten without further warning. Is that okay?");
    Ok(confirm.confirm(&prompt)?)
}

/// Entries of `out_dir` that look like results of a batch with this prefix.
fn existing_results(out_dir: &Path, prefix: &str) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(out_dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if looks_like_result(&name, prefix) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

impl PreparedBatch {
    pub fn total_records(&self) -> usize {
        self.total_records
    }

    /// Number of jobs the window will admit.
    pub fn expected_jobs(&self) -> usize {
        self.options.window.expected_len(self.total_records)
    }

    /// The (ordinal, file name) pairs a run would submit, without launching.
    pub fn dry_run(&self) -> Result<Vec<(usize, String)>> {
        let records = FastaReader::open(&self.options.fasta_file)?;
        let mut names = Vec::new();
        for record in self.options.window.apply(records) {
            let record = record?;
            names.push((record.index, self.naming.file_name(&record)));
        }
        Ok(names)
    }

    /// Launch every admitted record and wait for the batch to drain.
    pub async fn execute<L: Launcher>(
        self,
        launcher: L,
        progress: &impl ProgressSink,
    ) -> Result<BatchReport> {
        let records = FastaReader::open(&self.options.fasta_file)
            .with_context(|| format!("failed to open {}", self.options.fasta_file.display()))?;
        let factory = JobFactory::new(
            self.options.command.clone(),
            self.options.email.clone(),
            self.options.output_format.clone(),
        );

        let scheduler = Scheduler::new(
            self.options.scheduler.clone(),
            launcher,
            self.naming,
            factory,
            self.options.out_dir.clone(),
        );
        let span = info_span!("batch", run_id = %scheduler.run_id());
        let report = scheduler
            .run(self.options.window.apply(records), progress)
            .instrument(span)
            .await?;
        Ok(report)
    }
}

/// Write the run report as pretty-printed JSON.
pub fn write_report(path: &Path, report: &BatchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(BatchError::from)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::NoProgress;
    use std::fs;
    use tempfile::TempDir;

    const FASTA: &str = ">a Protein A/B\nMKVL\n>b kinase\nMSTN\n>c\nGGGG\n";

    /// Records every prompt and answers with a fixed reply.
    struct Scripted {
        answer: bool,
        prompts: Vec<String>,
    }

    impl Scripted {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                prompts: Vec::new(),
            }
        }
    }

    impl Confirm for Scripted {
        fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
            self.prompts.push(prompt.to_string());
            Ok(self.answer)
        }
    }

    fn setup() -> (TempDir, BatchOptions) {
        let dir = TempDir::new().unwrap();
        let fasta = dir.path().join("seqs.faa");
        fs::write(&fasta, FASTA).unwrap();
        let options = BatchOptions {
            fasta_file: fasta,
            out_dir: dir.path().join("results"),
            email: "me@example.org".into(),
            prefix: String::new(),
            auto_number: true,
            use_description: false,
            description_mode: DescriptionMode::Full,
            window: RecordWindow::default(),
            output_format: None,
            scheduler: SchedulerConfig::new(2, 0.05)
                .unwrap()
                .with_launch_delay(Duration::ZERO),
            command: CommandTemplate::default(),
            dry_run: false,
        };
        (dir, options)
    }

    #[test]
    fn naming_disabled_fails_before_any_side_effect() {
        let (_dir, mut options) = setup();
        options.auto_number = false;
        options.use_description = false;
        let out_dir = options.out_dir.clone();
        let mut confirm = Scripted::new(true);

        let err = prepare(options, &mut confirm).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<BatchError>(),
            Some(BatchError::NamingDisabled)
        ));
        assert!(confirm.prompts.is_empty());
        assert!(!out_dir.exists());
    }

    #[test]
    fn duplicate_descriptions_fail_before_any_prompt() {
        let (dir, mut options) = setup();
        let fasta = dir.path().join("dupes.faa");
        fs::write(&fasta, ">hypothetical protein\nMK\n>x\nMK\n>hypothetical protein\nMK\n").unwrap();
        options.fasta_file = fasta;
        options.auto_number = false;
        options.use_description = true;
        let out_dir = options.out_dir.clone();
        let mut confirm = Scripted::new(true);

        let err = prepare(options.clone(), &mut confirm).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<BatchError>(),
            Some(BatchError::DuplicateName { first: 0, second: 2, .. })
        ));
        assert!(confirm.prompts.is_empty());
        assert!(!out_dir.exists());

        // A window that holds only one of the duplicates is fine.
        options.window = RecordWindow::new(1, None).unwrap();
        assert!(prepare(options, &mut confirm).unwrap().is_some());
    }

    #[test]
    fn dot_dot_description_cannot_escape_results_dir() {
        let (dir, mut options) = setup();
        let fasta = dir.path().join("dots.faa");
        fs::write(&fasta, ">a\nMK\n>..\nMK\n").unwrap();
        options.fasta_file = fasta;
        options.auto_number = false;
        options.use_description = true;
        options.dry_run = true;

        let err = prepare(options, &mut Scripted::new(true)).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<BatchError>(),
            Some(BatchError::UnusableName { ordinal: 1, .. })
        ));
    }

    #[test]
    fn missing_email_is_a_config_error() {
        let (_dir, mut options) = setup();
        options.email = " ".into();
        let err = prepare(options, &mut Scripted::new(true)).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<BatchError>(),
            Some(BatchError::Config(_))
        ));
    }

    #[test]
    fn declining_directory_creation_aborts_cleanly() {
        let (_dir, options) = setup();
        let out_dir = options.out_dir.clone();
        let mut confirm = Scripted::new(false);

        assert!(prepare(options, &mut confirm).unwrap().is_none());
        assert_eq!(confirm.prompts.len(), 1);
        assert!(!out_dir.exists());
    }

    #[test]
    fn accepting_directory_creation_creates_it() {
        let (_dir, options) = setup();
        let out_dir = options.out_dir.clone();

        let prepared = prepare(options, &mut Scripted::new(true)).unwrap().unwrap();
        assert!(out_dir.is_dir());
        assert_eq!(prepared.total_records(), 3);
        assert_eq!(prepared.expected_jobs(), 3);
    }

    #[test]
    fn existing_results_require_one_confirmation() {
        let (_dir, options) = setup();
        fs::create_dir(&options.out_dir).unwrap();
        for i in 0..7 {
            fs::write(options.out_dir.join(format!("{i}.xml.xml")), "").unwrap();
        }
        fs::write(options.out_dir.join("notes.txt"), "").unwrap();

        let mut decline = Scripted::new(false);
        assert!(prepare(options.clone(), &mut decline).unwrap().is_none());
        assert_eq!(decline.prompts.len(), 1);
        let prompt = &decline.prompts[0];
        assert!(prompt.contains("0.xml.xml"));
        assert!(prompt.contains("4.xml.xml"));
        assert!(!prompt.contains("5.xml.xml"));
        assert!(!prompt.contains("notes.txt"));

        let mut accept = Scripted::new(true);
        assert!(prepare(options, &mut accept).unwrap().is_some());
        assert_eq!(accept.prompts.len(), 1);
    }

    #[test]
    fn dry_run_lists_names_without_touching_disk() {
        let (_dir, mut options) = setup();
        options.dry_run = true;
        options.email.clear();
        options.use_description = true;
        options.window = RecordWindow::new(0, Some(2)).unwrap();
        let out_dir = options.out_dir.clone();

        let prepared = prepare(options, &mut Scripted::new(false)).unwrap().unwrap();
        let names = prepared.dry_run().unwrap();
        assert_eq!(
            names,
            vec![
                (0, "0_-_a Protein A_B".to_string()),
                (1, "1_-_b kinase".to_string())
            ]
        );
        assert!(!out_dir.exists());
    }

    #[test]
    fn resolve_prefers_cli_over_config() {
        use crate::cli::{Cli, Command};
        use clap::Parser;

        let cli = Cli::parse_from([
            "iprbatch", "run", "s.faa", "out", "-j", "50", "--timeout", "60", "-f", "1", "-t", "3",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected Run command");
        };
        let config = BatchConfig {
            email: "file@example.org".into(),
            single_results_format: Some("xml".into()),
            ..Default::default()
        };

        let options = BatchOptions::resolve(&args, &config).unwrap();
        assert_eq!(options.email, "file@example.org");
        assert_eq!(options.scheduler.max_concurrent, 20);
        assert_eq!(options.scheduler.job_timeout, Some(Duration::from_secs(60)));
        assert_eq!(options.window, RecordWindow::new(1, Some(3)).unwrap());
        assert_eq!(options.output_format.as_deref(), Some("xml"));
        assert!(options.out_dir.is_absolute());
    }

    #[test]
    fn resolve_rejects_inverted_window() {
        use crate::cli::{Cli, Command};
        use clap::Parser;

        let cli = Cli::parse_from(["iprbatch", "run", "s.faa", "out", "-f", "5", "-t", "2"]);
        let Command::Run(args) = cli.command else {
            panic!("expected Run command");
        };
        let err = BatchOptions::resolve(&args, &BatchConfig::default()).unwrap_err();
        assert!(matches!(err, BatchError::InvalidWindow { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn executes_helper_for_each_record() {
        let (dir, mut options) = setup();
        options.use_description = true;
        options.description_mode = DescriptionMode::FirstWord;
        // The helper touches whatever follows `--outfile`, its last argument.
        options.command = CommandTemplate {
            program: "sh".into(),
            args: vec![
                "-c".into(),
                r#"for a in "$@"; do last="$a"; done; touch "$last""#.into(),
                "helper".into(),
            ],
        };

        let prepared = prepare(options, &mut AssumeYes).unwrap().unwrap();
        let report = prepared
            .execute(crate::launch::ProcessLauncher::new(true), &NoProgress)
            .await
            .unwrap();

        assert_eq!(report.admitted, 3);
        assert!(report.all_succeeded());
        let results = dir.path().join("results");
        assert!(results.join("0_-_a").exists());
        assert!(results.join("1_-_b").exists());
        assert!(results.join("2_-_c").exists());

        let report_path = dir.path().join("report.json");
        write_report(&report_path, &report).unwrap();
        let parsed: BatchReport =
            serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(parsed.jobs.len(), 3);
        assert_eq!(parsed.run_id, report.run_id);
    }
}
