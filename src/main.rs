use anyhow::{anyhow, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use datahub_provider::config::Config;
use datahub_provider::datahub::auth::Credentials;
use datahub_provider::datahub::client::DatahubClient;
use datahub_provider::datahub::error::format_datahub_error;
use datahub_provider::datahub::pool::WorkerPool;
use datahub_provider::resource::{
    get_schema, project, subscription, topic, Provider, ProviderError, ResourceState,
};
use datahub_provider::VERSION;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Manage Alibaba Cloud Datahub projects, topics and subscriptions
#[derive(Parser, Debug)]
#[command(name = "datahub-provider", version, about, long_about = None)]
struct Args {
    /// Datahub endpoint URL
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Region used to derive the endpoint
    #[arg(long, global = true)]
    region: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Output format for resource state
    #[arg(long, value_enum, default_value = "json", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage alicloud_datahub_project resources
    Project {
        #[command(subcommand)]
        op: ProjectOp,
    },
    /// Manage alicloud_datahub_topic resources
    Topic {
        #[command(subcommand)]
        op: TopicOp,
    },
    /// Manage alicloud_datahub_subscription resources
    Subscription {
        #[command(subcommand)]
        op: SubscriptionOp,
    },
    /// Save defaults to the config file
    Configure {
        /// Access key id to use when the environment does not set one
        #[arg(long)]
        access_key_id: Option<String>,
        /// Worker tasks serving queued calls
        #[arg(long)]
        pool_workers: Option<usize>,
        /// Pending queued calls before new ones are rejected
        #[arg(long)]
        pool_queue: Option<usize>,
    },
}

#[derive(ClapArgs, Debug)]
struct IdArg {
    /// Resource ID, e.g. `project:topic`
    #[arg(long)]
    id: String,
}

#[derive(Subcommand, Debug)]
enum ProjectOp {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        comment: Option<String>,
    },
    Read(IdArg),
    Update {
        #[command(flatten)]
        id: IdArg,
        #[arg(long)]
        comment: Option<String>,
    },
    Delete(IdArg),
    Import(IdArg),
}

#[derive(Subcommand, Debug)]
enum TopicOp {
    Create {
        #[arg(long)]
        project: String,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        shard_count: i64,
        #[arg(long)]
        life_cycle: i64,
        /// TUPLE or BLOB
        #[arg(long)]
        record_type: String,
        #[command(flatten)]
        schema: RecordSchemaArg,
        #[arg(long)]
        comment: Option<String>,
    },
    Read(IdArg),
    Update {
        #[command(flatten)]
        id: IdArg,
        #[arg(long)]
        life_cycle: Option<i64>,
        #[arg(long)]
        comment: Option<String>,
        /// Only accepted if unchanged; a different count needs a new topic
        #[arg(long)]
        shard_count: Option<i64>,
        #[command(flatten)]
        schema: RecordSchemaArg,
    },
    Delete(IdArg),
    Import(IdArg),
}

#[derive(ClapArgs, Debug)]
struct RecordSchemaArg {
    /// Record schema JSON for TUPLE topics
    #[arg(long, conflicts_with = "record_schema_file")]
    record_schema: Option<String>,
    /// File holding the record schema JSON
    #[arg(long)]
    record_schema_file: Option<PathBuf>,
}

impl RecordSchemaArg {
    fn resolve(&self) -> Result<Option<String>> {
        match (&self.record_schema, &self.record_schema_file) {
            (Some(schema), _) => Ok(Some(schema.clone())),
            (None, Some(path)) => std::fs::read_to_string(path)
                .map(Some)
                .with_context(|| format!("failed to read record schema from {:?}", path)),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Subcommand, Debug)]
enum SubscriptionOp {
    Create {
        #[arg(long)]
        project: String,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        comment: Option<String>,
    },
    Read(IdArg),
    Update {
        #[command(flatten)]
        id: IdArg,
        #[arg(long)]
        comment: Option<String>,
    },
    Delete(IdArg),
    Import(IdArg),
}

/// A resource operation with its fields resolved
enum Operation {
    Create(Map<String, Value>),
    Read(String),
    Update { id: String, changes: Map<String, Value> },
    Delete(String),
    Import(String),
}

/// Collect the set fields into a configuration map
fn fields<const N: usize>(pairs: [(&str, Option<Value>); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect()
}

impl ProjectOp {
    fn into_operation(self) -> Operation {
        match self {
            Self::Create { name, comment } => Operation::Create(fields([
                ("name", Some(json!(name))),
                ("comment", comment.map(Value::from)),
            ])),
            Self::Update { id, comment } => Operation::Update {
                id: id.id,
                changes: fields([("comment", comment.map(Value::from))]),
            },
            Self::Read(id) => Operation::Read(id.id),
            Self::Delete(id) => Operation::Delete(id.id),
            Self::Import(id) => Operation::Import(id.id),
        }
    }
}

impl TopicOp {
    fn into_operation(self) -> Result<Operation> {
        Ok(match self {
            Self::Create {
                project,
                topic,
                shard_count,
                life_cycle,
                record_type,
                schema,
                comment,
            } => Operation::Create(fields([
                ("project_name", Some(json!(project))),
                ("topic_name", Some(json!(topic))),
                ("shard_count", Some(json!(shard_count))),
                ("life_cycle", Some(json!(life_cycle))),
                ("record_type", Some(json!(record_type))),
                ("record_schema", schema.resolve()?.map(Value::from)),
                ("comment", comment.map(Value::from)),
            ])),
            Self::Update {
                id,
                life_cycle,
                comment,
                shard_count,
                schema,
            } => Operation::Update {
                id: id.id,
                changes: fields([
                    ("life_cycle", life_cycle.map(Value::from)),
                    ("comment", comment.map(Value::from)),
                    ("shard_count", shard_count.map(Value::from)),
                    ("record_schema", schema.resolve()?.map(Value::from)),
                ]),
            },
            Self::Read(id) => Operation::Read(id.id),
            Self::Delete(id) => Operation::Delete(id.id),
            Self::Import(id) => Operation::Import(id.id),
        })
    }
}

impl SubscriptionOp {
    fn into_operation(self) -> Operation {
        match self {
            Self::Create {
                project,
                topic,
                comment,
            } => Operation::Create(fields([
                ("project_name", Some(json!(project))),
                ("topic_name", Some(json!(topic))),
                ("comment", comment.map(Value::from)),
            ])),
            Self::Update { id, comment } => Operation::Update {
                id: id.id,
                changes: fields([("comment", comment.map(Value::from))]),
            },
            Self::Read(id) => Operation::Read(id.id),
            Self::Delete(id) => Operation::Delete(id.id),
            Self::Import(id) => Operation::Import(id.id),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("datahub-provider {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir
            .join("datahub-provider")
            .join("datahub-provider.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".datahub-provider").join("datahub-provider.log");
    }
    PathBuf::from("datahub-provider.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_guard = setup_logging(args.log_level)?;

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {:#}", err);
        if let Some(hint) = hint(&err) {
            eprintln!("Hint: {}", hint);
        }
        drop(log_guard);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load();

    let (type_name, operation) = match args.command {
        Command::Configure {
            access_key_id,
            pool_workers,
            pool_queue,
        } => {
            config.endpoint = args.endpoint.or(config.endpoint);
            config.region = args.region.or(config.region);
            config.access_key_id = access_key_id.or(config.access_key_id);
            config.pool_workers = pool_workers.or(config.pool_workers);
            config.pool_queue = pool_queue.or(config.pool_queue);
            config.save().context("failed to save config")?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            return Ok(());
        }
        Command::Project { op } => (project::TYPE_NAME, op.into_operation()),
        Command::Topic { op } => (topic::TYPE_NAME, op.into_operation()?),
        Command::Subscription { op } => (subscription::TYPE_NAME, op.into_operation()),
    };

    let endpoint = config.effective_endpoint(args.endpoint.as_deref(), args.region.as_deref());
    tracing::info!("Using endpoint: {}", endpoint);

    let credentials = Credentials::from_env_or(config.access_key_id.as_deref())
        .context("no Datahub credentials")?;
    let pool = WorkerPool::new(config.effective_pool_workers(), config.effective_pool_queue());
    let client = DatahubClient::with_pool(&endpoint, credentials, pool)?;
    let provider = Provider::new(Arc::new(client.clone()));

    let result = execute(&provider, type_name, operation).await;
    client.shutdown().await;

    if let Some(state) = result? {
        print_state(&state, args.output)?;
    }
    Ok(())
}

async fn execute(
    provider: &Provider,
    type_name: &str,
    operation: Operation,
) -> Result<Option<ResourceState>> {
    match operation {
        Operation::Create(config) => Ok(Some(provider.create(type_name, config).await?)),
        Operation::Read(id) => {
            let state = provider.read(type_name, &id).await?;
            if state.is_none() {
                eprintln!("{} '{}' no longer exists", type_name, id);
            }
            Ok(state)
        }
        Operation::Update { id, changes } => {
            let prior = provider
                .read(type_name, &id)
                .await?
                .ok_or_else(|| anyhow!("{} '{}' does not exist", type_name, id))?;

            let schema = get_schema(type_name)
                .ok_or_else(|| anyhow!("unknown resource type '{}'", type_name))?;
            let mut config: Map<String, Value> = schema
                .configurable_fields()
                .filter_map(|f| prior.attr(&f.name).map(|v| (f.name.clone(), v.clone())))
                .collect();
            config.extend(changes);

            Ok(Some(provider.update(type_name, &prior, config).await?))
        }
        Operation::Delete(id) => {
            provider.delete(type_name, &id).await?;
            eprintln!("{} '{}' deleted", type_name, id);
            Ok(None)
        }
        Operation::Import(id) => Ok(Some(provider.import(type_name, &id).await?)),
    }
}

fn print_state(state: &ResourceState, output: OutputFormat) -> Result<()> {
    let rendered = match output {
        OutputFormat::Json => serde_json::to_string_pretty(state)?,
        OutputFormat::Yaml => serde_yaml::to_string(state)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

/// Operator-facing advice for known failures
fn hint(err: &anyhow::Error) -> Option<String> {
    let provider_error = err.downcast_ref::<ProviderError>()?;
    match provider_error {
        ProviderError::RequiresReplacement { .. } => {
            Some("delete the resource and create it again with the new values".to_string())
        }
        ProviderError::InvalidId { .. } => {
            Some("import the resource again using the fields named above".to_string())
        }
        other => other.datahub_error().map(format_datahub_error),
    }
}
