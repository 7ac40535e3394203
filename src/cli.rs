//! Command-line surface and per-command handlers.
//!
//! This is the only layer that prints to the terminal; the core layers
//! below it return values and errors.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::db::{execute, ConnectionSpec, ResultSet, SessionPool};
use crate::error::Error;
use crate::query::{throughput_query, Granularity, NodeFilter, QueryParameters, ReportScope};
use crate::report::{aggregate, render_table, write_file, FileFormat};

const TIME_FLAG_FORMAT: &str = "%Y%m%d%H%M%S";

/// Statistic reports over EMM mediation cluster audit-trail databases.
#[derive(Parser)]
#[command(name = "emmstats", version, about)]
pub struct Cli {
    /// Full path of the EMM YAML configuration file
    #[arg(long = "config-file", default_value = "emm-config.yaml", global = true)]
    pub config_file: PathBuf,

    /// Name of the EMM cluster which contains the logical server
    #[arg(long, global = true)]
    pub cluster: Option<String>,

    /// Name of the EMM logical server
    #[arg(long, global = true)]
    pub lserver: Option<String>,

    /// Name of a stream defined in the configuration file
    #[arg(long, global = true)]
    pub stream: Option<String>,

    /// Start of the report window, YYYYMMDDHHMMSS
    #[arg(long = "start-time", default_value = "20190101000000", global = true)]
    pub start_time: String,

    /// End of the report window, YYYYMMDDHHMMSS (default: now)
    #[arg(long = "end-time", global = true)]
    pub end_time: Option<String>,

    /// Time interval for grouping rows: minute, hour, day, month
    #[arg(long = "group-by", default_value = "day", global = true)]
    pub group_by: String,

    /// Output format of the report
    #[arg(long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// File to store the report in instead of printing it
    #[arg(long = "output-file", global = true)]
    pub output_file: Option<PathBuf>,

    /// Directory for output files
    #[arg(long = "output-dir", default_value = ".", global = true)]
    pub output_dir: PathBuf,

    /// Deadline for a single report query, in seconds
    #[arg(long = "query-timeout", default_value_t = 300, global = true)]
    pub query_timeout: u64,

    /// Verbose mode (sets the log level to debug)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Input/output files, CDRs and bytes per time bucket
    #[command(alias = "t")]
    Throughput,

    /// CDR counts per time bucket
    #[command(alias = "c")]
    Cdrs,

    /// File counts and byte volumes per time bucket
    #[command(alias = "f")]
    Files,

    /// CPU and memory statistics (not implemented)
    #[command(alias = "p")]
    Performance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Txt,
    Csv,
    Xls,
}

#[derive(Debug, Clone, Copy)]
enum ReportKind {
    Throughput,
    Cdrs,
    Files,
}

impl ReportKind {
    fn label(self) -> &'static str {
        match self {
            ReportKind::Throughput => "Throughput",
            ReportKind::Cdrs => "CDR Throughput",
            ReportKind::Files => "File Throughput",
        }
    }

    /// The CDR and file reports reuse the throughput query and narrow the
    /// result to their column families.
    fn narrow(self, result_set: ResultSet) -> ResultSet {
        match self {
            ReportKind::Throughput => result_set,
            ReportKind::Cdrs => {
                result_set.project(|name| name == "time" || name.ends_with("_cdrs"))
            }
            ReportKind::Files => result_set.project(|name| {
                name == "time" || name.ends_with("_files") || name.ends_with("_bytes")
            }),
        }
    }
}

/// Dispatch the parsed command.
pub async fn run(cli: Cli) -> Result<(), Error> {
    let kind = match cli.command {
        Commands::Throughput => ReportKind::Throughput,
        Commands::Cdrs => ReportKind::Cdrs,
        Commands::Files => ReportKind::Files,
        Commands::Performance => return Err(Error::UnsupportedReport("performance")),
    };

    let config = Config::load(&cli.config_file)?;
    let pool = SessionPool::new();
    run_report(&cli, &config, &pool, kind).await
}

async fn run_report(
    cli: &Cli,
    config: &Config,
    pool: &SessionPool,
    kind: ReportKind,
) -> Result<(), Error> {
    let params = query_parameters(cli)?;
    let (spec, scope, target) = resolve_target(cli, config)?;

    let session = pool.get_or_create(&spec).await?;

    let sql = throughput_query(&scope, &params);
    tracing::debug!(entity = %target, query = %sql, "rendered report query");

    let result_set = execute(&session, &sql, Duration::from_secs(cli.query_timeout)).await?;
    let result_set = kind.narrow(result_set);
    let aggregates = aggregate(&result_set);

    let caption = format!("{} : {target}", kind.label());

    match &cli.output_file {
        Some(file) => {
            let path = cli.output_dir.join(file);
            let format = match cli.format {
                // Table is the console default; on disk it becomes txt.
                OutputFormat::Table | OutputFormat::Txt => FileFormat::Txt,
                OutputFormat::Csv => FileFormat::Csv,
                OutputFormat::Xls => FileFormat::Xls,
            };
            write_file(&result_set, &path, format)?;
            tracing::info!(path = %path.display(), "report written");
        }
        None => {
            println!("{}", render_table(&result_set, &aggregates, &caption));
        }
    }

    Ok(())
}

/// Pick the report target from the stream / logical-server flags.
///
/// A stream and explicit logical-server coordinates are mutually exclusive.
fn resolve_target(
    cli: &Cli,
    config: &Config,
) -> Result<(ConnectionSpec, ReportScope, String), Error> {
    if cli.stream.is_some() && (cli.lserver.is_some() || cli.cluster.is_some()) {
        return Err(Error::InvalidOptions(
            "either specify a stream, or a logical server and cluster, not both".to_string(),
        ));
    }

    if let Some(stream_name) = &cli.stream {
        let stream = config
            .find_stream(stream_name)
            .ok_or_else(|| Error::StreamNotFound(stream_name.clone()))?;
        let assigned = stream
            .assigned
            .as_ref()
            .ok_or_else(|| Error::StreamNotAssigned(stream.name.clone()))?;

        config
            .find_cluster(&assigned.cluster)
            .ok_or_else(|| Error::ClusterNotFound(assigned.cluster.clone()))?;
        let (cluster, server) = config
            .find_logical_server(&assigned.name, &assigned.cluster)
            .ok_or_else(|| Error::ServerNotFound {
                server: assigned.name.clone(),
                cluster: assigned.cluster.clone(),
            })?;

        let spec = config.connection_spec(cluster, server)?;
        let scope = ReportScope::Stream {
            collectors: NodeFilter::new(&stream.collectors, &stream.collector_ids),
            distributors: NodeFilter::new(&stream.distributors, &stream.distributor_ids),
        };
        return Ok((spec, scope, format!("Stream {}", stream.name)));
    }

    match (&cli.lserver, &cli.cluster) {
        (Some(server_name), Some(cluster_name)) => {
            config
                .find_cluster(cluster_name)
                .ok_or_else(|| Error::ClusterNotFound(cluster_name.clone()))?;
            let (cluster, server) = config
                .find_logical_server(server_name, cluster_name)
                .ok_or_else(|| Error::ServerNotFound {
                    server: server_name.clone(),
                    cluster: cluster_name.clone(),
                })?;

            let spec = config.connection_spec(cluster, server)?;
            Ok((
                spec,
                ReportScope::LogicalServer,
                format!("Logical Server {}", server.name),
            ))
        }
        _ => Err(Error::InvalidOptions(
            "specify --stream, or both --lserver and --cluster".to_string(),
        )),
    }
}

fn query_parameters(cli: &Cli) -> Result<QueryParameters, Error> {
    let start = parse_time_flag("start-time", &cli.start_time)?;
    let end = match &cli.end_time {
        Some(value) => parse_time_flag("end-time", value)?,
        None => Utc::now().naive_utc(),
    };

    Ok(QueryParameters {
        start,
        end,
        granularity: Granularity::parse(&cli.group_by),
    })
}

fn parse_time_flag(which: &'static str, value: &str) -> Result<NaiveDateTime, Error> {
    NaiveDateTime::parse_from_str(value, TIME_FLAG_FORMAT).map_err(|_| Error::InvalidTime {
        which,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    fn sample_config() -> Config {
        serde_yaml::from_str(
            r#"
clusters:
  - name: prod
    default-username: mmsuper
    default-password: thule
    logical-servers:
      - name: ls01
        host: 10.0.0.1
        port: 5432
        database: mmdb01
streams:
  - name: S1
    collectors: [A, B]
    distributors: [C]
    assigned-logical-server:
      name: ls01
      cluster: prod
  - name: orphan
    collectors: [X]
"#,
        )
        .unwrap()
    }

    #[test]
    fn stream_flag_resolves_stream_scope() {
        let cli = cli(&["emmstats", "--stream", "S1", "throughput"]);
        let config = sample_config();
        let (spec, scope, target) = resolve_target(&cli, &config).unwrap();
        assert_eq!(spec.name, "ls01");
        assert_eq!(target, "Stream S1");
        assert!(matches!(scope, ReportScope::Stream { .. }));
    }

    #[test]
    fn stream_and_lserver_are_mutually_exclusive() {
        let cli = cli(&[
            "emmstats",
            "--stream",
            "S1",
            "--lserver",
            "ls01",
            "throughput",
        ]);
        assert!(matches!(
            resolve_target(&cli, &sample_config()),
            Err(Error::InvalidOptions(_))
        ));
    }

    #[test]
    fn unassigned_stream_is_a_distinct_error() {
        let cli = cli(&["emmstats", "--stream", "orphan", "throughput"]);
        assert!(matches!(
            resolve_target(&cli, &sample_config()),
            Err(Error::StreamNotAssigned(_))
        ));
    }

    #[test]
    fn missing_target_flags_is_invalid() {
        let cli = cli(&["emmstats", "throughput"]);
        assert!(matches!(
            resolve_target(&cli, &sample_config()),
            Err(Error::InvalidOptions(_))
        ));
    }

    #[test]
    fn lserver_flags_resolve_server_scope() {
        let cli = cli(&[
            "emmstats",
            "--lserver",
            "ls01",
            "--cluster",
            "prod",
            "throughput",
        ]);
        let (spec, scope, _) = resolve_target(&cli, &sample_config()).unwrap();
        assert_eq!(spec.host, "10.0.0.1");
        assert!(matches!(scope, ReportScope::LogicalServer));
    }

    #[test]
    fn time_flags_are_validated() {
        let cli = cli(&[
            "emmstats",
            "--start-time",
            "20190101000000",
            "--end-time",
            "20190131235959",
            "throughput",
        ]);
        let params = query_parameters(&cli).unwrap();
        assert_eq!(params.granularity, Granularity::Day);
        assert!(params.start < params.end);

        let bad = Cli::try_parse_from(["emmstats", "--start-time", "Jan-1", "throughput"]).unwrap();
        assert!(matches!(
            query_parameters(&bad),
            Err(Error::InvalidTime { .. })
        ));
    }

    #[test]
    fn cdr_report_narrows_to_cdr_columns() {
        use crate::db::{Cell, ColumnInfo, ColumnKind};

        let rs = ResultSet {
            columns: ["time", "input_files", "input_cdrs", "output_cdrs", "output_bytes"]
                .iter()
                .map(|name| ColumnInfo {
                    name: name.to_string(),
                    kind: if *name == "time" {
                        ColumnKind::Text
                    } else {
                        ColumnKind::Int
                    },
                })
                .collect(),
            rows: vec![vec![
                Cell::Text("20190115".to_string()),
                Cell::Int(1),
                Cell::Int(100),
                Cell::Int(90),
                Cell::Int(4096),
            ]],
        };

        let narrowed = ReportKind::Cdrs.narrow(rs.clone());
        assert_eq!(
            narrowed.column_names(),
            vec!["time", "input_cdrs", "output_cdrs"]
        );

        let narrowed = ReportKind::Files.narrow(rs);
        assert_eq!(
            narrowed.column_names(),
            vec!["time", "input_files", "output_bytes"]
        );
    }
}
