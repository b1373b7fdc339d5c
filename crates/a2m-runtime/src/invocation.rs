//! The single entry point: configuration in, [`Results`] out.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use a2m_core::error::{ConvertError, Result};
use a2m_core::models::{Credentials, RecordTypes, Region, Results};
use a2m_core::settings::Settings;
use a2m_core::transforms::TransformOptions;
use a2m_data::source::{resolve_source, FileOrder, SortOrder, Source};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::importer::{Importer, PipelineOptions};
use crate::orchestrator::{IngestMode, PipelineOrchestrator, ResolvedInput};
use crate::run_log::{default_logs_dir, persist_results, RunLog};

/// A live byte stream of export records.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Everything one invocation needs.
///
/// Input priority: `dir`, then `file`, then `stream`.
pub struct Config {
    pub credentials: Credentials,
    pub dir: Option<PathBuf>,
    pub file: Option<PathBuf>,
    pub stream: Option<ByteStream>,
    pub region: Region,
    pub strict: bool,
    pub verbose: bool,
    /// Persist the results document.
    pub logs: bool,
    pub record_types: RecordTypes,
    pub custom_user_id: Option<String>,
    pub aliases: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
    pub dedupe: bool,
    pub compress: bool,
    pub mode: IngestMode,
    pub file_order: FileOrder,
    /// Defaults to [`default_logs_dir`].
    pub logs_dir: Option<PathBuf>,
}

impl Config {
    /// A configuration with every option at its default and no input.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            dir: None,
            file: None,
            stream: None,
            region: Region::default(),
            strict: false,
            verbose: false,
            logs: false,
            record_types: RecordTypes::default(),
            custom_user_id: None,
            aliases: BTreeMap::new(),
            tags: BTreeMap::new(),
            dedupe: false,
            compress: false,
            mode: IngestMode::default(),
            file_order: FileOrder::default(),
            logs_dir: None,
        }
    }

    /// Build from parsed CLI settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut config = Self::new(settings.credentials());
        config.dir = settings.dir.clone();
        config.file = settings.file.clone();
        config.region = settings.region()?;
        config.strict = settings.strict;
        config.verbose = settings.verbose;
        config.logs = settings.logs;
        config.record_types = settings.record_types();
        config.custom_user_id = settings.custom_user_id.clone();
        config.aliases = settings.alias_map();
        config.tags = settings.tag_map();
        config.logs_dir = settings.logs_dir.clone();
        config.dedupe = settings.dedupe;
        config.compress = settings.compress;
        config.file_order = FileOrder {
            events: settings.events_order.parse::<SortOrder>()?,
            profiles: settings.profiles_order.parse::<SortOrder>()?,
        };
        if settings.per_file {
            config.mode = IngestMode::PerFile;
        }
        Ok(config)
    }

    /// Setup errors that must abort before any pipeline starts.
    pub fn validate(&self) -> Result<()> {
        if self.credentials.token.is_empty() && self.credentials.secret.is_empty() {
            return Err(ConvertError::Config(
                "credentials need a token or a secret".to_string(),
            ));
        }
        if self.custom_user_id.as_deref() == Some("") {
            return Err(ConvertError::Config(
                "custom user id field must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            region: self.region,
            strict: self.strict,
            verbose: self.verbose,
            dedupe: self.dedupe,
            compress: self.compress,
            aliases: self.aliases.clone(),
            tags: self.tags.clone(),
            transform: TransformOptions::new(self.custom_user_id.as_deref()),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("credentials", &self.credentials)
            .field("dir", &self.dir)
            .field("file", &self.file)
            .field("stream", &self.stream.as_ref().map(|_| "<stream>"))
            .field("region", &self.region)
            .field("strict", &self.strict)
            .field("record_types", &self.record_types)
            .field("custom_user_id", &self.custom_user_id)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Run one invocation with a fresh [`RunLog`].
pub async fn run<I: Importer + ?Sized>(config: Config, importer: &I) -> Result<Results> {
    let log = RunLog::new(config.verbose);
    run_with_log(config, importer, &log).await
}

/// Run one invocation, recording into `log`.
///
/// Only setup errors are returned; per-record and per-pipeline problems are
/// reported inside the [`Results`]. The completion notice is emitted exactly
/// once, whichever way this returns.
pub async fn run_with_log<I: Importer + ?Sized>(
    config: Config,
    importer: &I,
    log: &RunLog,
) -> Result<Results> {
    let result = execute(config, importer, log).await;
    log.complete(result.as_ref());
    result
}

async fn execute<I: Importer + ?Sized>(
    mut config: Config,
    importer: &I,
    log: &RunLog,
) -> Result<Results> {
    config.validate()?;
    log.detail(format!("configuration: {:?}", config));

    let source = resolve_source(
        config.dir.as_deref(),
        config.file.as_deref(),
        config.stream.is_some(),
    )?;

    let input = match source {
        Source::File(path) => {
            log.info(format!("importing file {}", path.display()));
            ResolvedInput::File(path)
        }
        Source::Directory { path, files } => {
            log.info(format!(
                "importing {} files from {}",
                files.len(),
                path.display()
            ));
            ResolvedInput::Directory(files)
        }
        Source::Stream => {
            let mut stream = config.stream.take().ok_or(ConvertError::NoInput)?;
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await?;
            log.info(format!("importing {} bytes from stream", buf.len()));
            ResolvedInput::Bytes(buf.into())
        }
    };

    let options = config.pipeline_options();
    let results = PipelineOrchestrator::new(importer, log)
        .with_mode(config.mode)
        .with_file_order(config.file_order)
        .run(&config.credentials, &input, config.record_types, &options)
        .await;

    if config.logs {
        let dir = config.logs_dir.clone().unwrap_or_else(default_logs_dir);
        match persist_results(&results, &dir) {
            Ok(path) => log.info(format!("results written to {}", path.display())),
            Err(e) => log.warn(format!("could not write results log: {}", e)),
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonl_importer::JsonlImporter;
    use a2m_core::models::RecordType;
    use clap::Parser;
    use tempfile::TempDir;

    fn creds() -> Credentials {
        Credentials {
            secret: "secret".into(),
            token: "token".into(),
            project: "123".into(),
        }
    }

    const LOGIN: &str = r#"{"event_type":"login","user_id":"u1","event_time":"2024-01-01T00:00:00Z","user_properties":{"plan":"pro"}}"#;

    #[tokio::test]
    async fn test_missing_path_aborts_before_any_pipeline() {
        let tmp = TempDir::new().expect("tempdir");
        let mut config = Config::new(creds());
        config.dir = Some(tmp.path().join("missing"));

        let importer = JsonlImporter::in_memory();
        let log = RunLog::new(false);
        let result = run_with_log(config, &importer, &log).await;

        assert!(matches!(result, Err(ConvertError::PathNotFound(_))));
        assert!(importer.records(RecordType::Event).is_empty());
        assert!(log.is_complete());
        assert_eq!(
            log.lines().iter().filter(|l| l.starts_with("import failed")).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_invalid_credentials_abort() {
        let config = Config::new(Credentials::default());
        let importer = JsonlImporter::in_memory();
        let result = run(config, &importer).await;
        assert!(matches!(result, Err(ConvertError::Config(_))));
    }

    #[tokio::test]
    async fn test_no_input_aborts() {
        let importer = JsonlImporter::in_memory();
        let result = run(Config::new(creds()), &importer).await;
        assert!(matches!(result, Err(ConvertError::NoInput)));
    }

    #[tokio::test]
    async fn test_stream_input() {
        let mut config = Config::new(creds());
        let body = format!("{}\n{}\n", LOGIN, r#"{"event_type":"view","device_id":"d1"}"#);
        config.stream = Some(Box::new(std::io::Cursor::new(body.into_bytes())));

        let importer = JsonlImporter::in_memory();
        let log = RunLog::new(false);
        let results = run_with_log(config, &importer, &log).await.unwrap();

        assert_eq!(results.events.success, 2);
        assert_eq!(results.users.success, 1);
        assert_eq!(results.users.empty, 1);
        assert_eq!(results.groups.total, 0);
        assert_eq!(
            log.lines().iter().filter(|l| l.as_str() == "import finished").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_path_wins_over_stream() {
        let tmp = TempDir::new().expect("tempdir");
        let file = tmp.path().join("one.json");
        std::fs::write(&file, LOGIN).unwrap();

        let mut config = Config::new(creds());
        config.file = Some(file);
        config.stream = Some(Box::new(std::io::Cursor::new(b"{}\n{}\n".to_vec())));

        let importer = JsonlImporter::in_memory();
        let results = run(config, &importer).await.unwrap();
        assert_eq!(results.events.total, 1);
    }

    #[tokio::test]
    async fn test_custom_user_id_reaches_transforms() {
        let tmp = TempDir::new().expect("tempdir");
        let file = tmp.path().join("one.json");
        std::fs::write(
            &file,
            r#"{"event_type":"x","user_id":"internal","user_properties":{"email":"a@b.c"}}"#,
        )
        .unwrap();

        let mut config = Config::new(creds());
        config.file = Some(file);
        config.custom_user_id = Some("email".into());

        let importer = JsonlImporter::in_memory();
        run(config, &importer).await.unwrap();

        assert_eq!(
            importer.records(RecordType::Event)[0]["properties"]["$user_id"],
            "a@b.c"
        );
        assert_eq!(importer.records(RecordType::User)[0]["$distinct_id"], "a@b.c");
    }

    #[tokio::test]
    async fn test_logs_are_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let file = tmp.path().join("one.json");
        std::fs::write(&file, LOGIN).unwrap();
        let logs_dir = tmp.path().join("logs");

        let mut config = Config::new(creds());
        config.file = Some(file);
        config.logs = true;
        config.logs_dir = Some(logs_dir.clone());

        let importer = JsonlImporter::in_memory();
        run(config, &importer).await.unwrap();

        let written: Vec<_> = std::fs::read_dir(&logs_dir).unwrap().collect();
        assert_eq!(written.len(), 1);
    }

    #[tokio::test]
    async fn test_unwritable_logs_dir_is_not_fatal() {
        let tmp = TempDir::new().expect("tempdir");
        let file = tmp.path().join("one.json");
        std::fs::write(&file, LOGIN).unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let mut config = Config::new(creds());
        config.file = Some(file);
        config.logs = true;
        config.logs_dir = Some(blocker.join("logs"));

        let importer = JsonlImporter::in_memory();
        let log = RunLog::new(false);
        let results = run_with_log(config, &importer, &log).await.unwrap();
        assert_eq!(results.events.success, 1);
        assert!(log.text().contains("could not write results log"));
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings::parse_from([
            "amplitude-to-mixpanel",
            "--token",
            "t",
            "--secret",
            "s",
            "--project",
            "9",
            "--dir",
            "./data",
            "--region",
            "EU",
            "--groups",
            "true",
            "--per-file",
            "--custom-user-id",
            "email",
        ]);
        let config = Config::from_settings(&settings).unwrap();
        assert_eq!(config.region, Region::Eu);
        assert_eq!(config.dir, Some(PathBuf::from("./data")));
        assert!(config.record_types.groups);
        assert_eq!(config.mode, IngestMode::PerFile);
        assert_eq!(config.custom_user_id.as_deref(), Some("email"));
        assert_eq!(config.credentials.project, "9");
        assert_eq!(config.file_order, FileOrder::default());
        assert!(!config.dedupe);
    }

    #[test]
    fn test_from_settings_import_options() {
        let settings = Settings::parse_from([
            "amplitude-to-mixpanel",
            "--token",
            "t",
            "--secret",
            "s",
            "--project",
            "9",
            "--dedupe",
            "true",
            "--compress",
            "true",
            "--events-order",
            "asc",
            "--profiles-order",
            "desc",
        ]);
        let config = Config::from_settings(&settings).unwrap();
        assert!(config.dedupe);
        assert!(config.compress);
        assert_eq!(
            config.file_order,
            FileOrder {
                events: SortOrder::Ascending,
                profiles: SortOrder::Descending,
            }
        );
    }
}
