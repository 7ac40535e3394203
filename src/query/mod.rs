//! Throughput query construction.
//!
//! Reports aggregate the `audittraillogentry` fact table: event 67 is an
//! input file collection, 73 an input CDR ingestion, 68 an output
//! distribution. A report is one SELECT built from three sub-aggregates
//! (input files/bytes, input CDRs, output files/CDRs/bytes) grouped by the
//! truncated event timestamp and FULL OUTER JOINed on that time key.
//!
//! Filter values are rendered as quoted SQL literals, matching the original
//! report shapes. Node names and IDs come from the operator configuration
//! file, not from untrusted input, but bound placeholders would still be
//! the safer construction.

use std::fmt::Write as _;

use chrono::NaiveDateTime;

/// Time-bucket width used to group report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Minute,
    Hour,
    Day,
    Month,
}

impl Granularity {
    /// Parse a user-supplied grouping name. Unrecognized values fall back
    /// to `Day`.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "minute" => Granularity::Minute,
            "hour" => Granularity::Hour,
            "month" => Granularity::Month,
            _ => Granularity::Day,
        }
    }

    /// Postgres `to_char` format for the grouping key. The four formats are
    /// left-padded and big-endian, so lexical ordering of the rendered keys
    /// is chronological ordering; any new granularity must preserve that.
    pub fn db_time_format(self) -> &'static str {
        match self {
            Granularity::Minute => "YYYYMMDDHH24MI",
            Granularity::Hour => "YYYYMMDDHH24",
            Granularity::Day => "YYYYMMDD",
            Granularity::Month => "YYYYMM",
        }
    }

    /// chrono format producing the same string as [`db_time_format`] for a
    /// given instant, used to truncate the range bounds to the grouping key.
    fn chrono_format(self) -> &'static str {
        match self {
            Granularity::Minute => "%Y%m%d%H%M",
            Granularity::Hour => "%Y%m%d%H",
            Granularity::Day => "%Y%m%d",
            Granularity::Month => "%Y%m",
        }
    }
}

/// Time range and grouping for one report query.
///
/// The rendered range bounds are truncated to the grouping format so they
/// compare consistently against the grouped time key.
#[derive(Debug, Clone)]
pub struct QueryParameters {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub granularity: Granularity,
}

impl QueryParameters {
    fn start_literal(&self) -> String {
        self.start.format(self.granularity.chrono_format()).to_string()
    }

    fn end_literal(&self) -> String {
        self.end.format(self.granularity.chrono_format()).to_string()
    }
}

/// Optional node name/ID filter applied to one sub-aggregate.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub names: Vec<String>,
    pub ids: Vec<String>,
}

impl NodeFilter {
    pub fn new(names: &[String], ids: &[String]) -> Self {
        Self {
            names: names.to_vec(),
            ids: ids.to_vec(),
        }
    }

    /// Render the filter predicate over the given name and ID columns.
    ///
    /// Both lists present: `(trim(name) IN (..) OR id IN (..))`. One list:
    /// that branch alone. Neither: `1 = 2`, since an empty stream definition
    /// must match nothing, never everything.
    pub fn predicate(&self, name_column: &str, id_column: &str) -> String {
        let names = quote_list(&self.names);
        let ids = quote_list(&self.ids);

        match (self.names.is_empty(), self.ids.is_empty()) {
            (false, false) => format!(
                "(trim({name_column}) IN ({names}) OR {id_column} IN ({ids}))"
            ),
            (false, true) => format!("trim({name_column}) IN ({names})"),
            (true, false) => format!("{id_column} IN ({ids})"),
            (true, true) => "1 = 2".to_string(),
        }
    }
}

/// Target of a throughput query: a whole logical server, or one stream
/// restricted to its collector and distributor nodes.
#[derive(Debug, Clone)]
pub enum ReportScope {
    LogicalServer,
    Stream {
        collectors: NodeFilter,
        distributors: NodeFilter,
    },
}

impl ReportScope {
    /// The stream-scoped query keeps the original `total_` column prefix.
    fn column_prefix(&self) -> &'static str {
        match self {
            ReportScope::LogicalServer => "",
            ReportScope::Stream { .. } => "total_",
        }
    }
}

/// Render the input/output throughput query for the given scope.
pub fn throughput_query(scope: &ReportScope, params: &QueryParameters) -> String {
    let p = scope.column_prefix();

    let (collector_filter, distributor_filter) = match scope {
        ReportScope::LogicalServer => (None, None),
        ReportScope::Stream {
            collectors,
            distributors,
        } => (
            Some(collectors.predicate("innodename", "innodeid")),
            Some(distributors.predicate("outnodename", "outnodeid")),
        ),
    };

    let input_files = sub_aggregate(
        "intime",
        67,
        &[
            (format!("{p}input_files"), "Count(*)".to_string()),
            (format!("{p}input_bytes"), "Sum(bytes)::bigint".to_string()),
        ],
        collector_filter.as_deref(),
        params,
    );

    let input_cdrs = sub_aggregate(
        "intime",
        73,
        &[(
            format!("{p}input_cdrs"),
            "COALESCE(Sum(cdrs)::bigint, 0)".to_string(),
        )],
        collector_filter.as_deref(),
        params,
    );

    let output = sub_aggregate(
        "outtime",
        68,
        &[
            (format!("{p}output_files"), "Count(*)".to_string()),
            (format!("{p}output_cdrs"), "Sum(cdrs)::bigint".to_string()),
            (format!("{p}output_bytes"), "Sum(bytes)::bigint".to_string()),
        ],
        distributor_filter.as_deref(),
        params,
    );

    format!(
        "SELECT COALESCE(a.time, b.time) AS time, \
         COALESCE(a.{p}input_files, 0) AS {p}input_files, \
         COALESCE(b.{p}input_cdrs, 0) AS {p}input_cdrs, \
         COALESCE(a.{p}input_bytes, 0) AS {p}input_bytes, \
         COALESCE(b.{p}output_files, 0) AS {p}output_files, \
         COALESCE(b.{p}output_cdrs, 0) AS {p}output_cdrs, \
         COALESCE(b.{p}output_bytes, 0) AS {p}output_bytes \
         FROM ({input_files}) a \
         FULL OUTER JOIN (\
         SELECT COALESCE(c.time, d.time) AS time, \
         c.{p}input_cdrs, d.{p}output_files, d.{p}output_cdrs, d.{p}output_bytes \
         FROM ({input_cdrs}) c \
         FULL OUTER JOIN ({output}) d ON c.time = d.time\
         ) b ON a.time = b.time \
         ORDER BY time"
    )
}

/// One grouped sub-aggregate over the fact table: a single event code,
/// truncated-time grouping key, the requested aggregate columns, the time
/// range bounds, and an optional node filter.
fn sub_aggregate(
    time_column: &str,
    event: i32,
    columns: &[(String, String)],
    filter: Option<&str>,
    params: &QueryParameters,
) -> String {
    let key = format!(
        "To_char({time_column}, '{}')",
        params.granularity.db_time_format()
    );

    let mut sql = format!("SELECT {key} AS time");
    for (name, expr) in columns {
        // write! to a String cannot fail
        let _ = write!(sql, ", {expr} AS {name}");
    }

    let _ = write!(
        sql,
        " FROM audittraillogentry WHERE event = {event} \
         AND {key} >= '{}' AND {key} <= '{}'",
        params.start_literal(),
        params.end_literal()
    );

    if let Some(predicate) = filter {
        let _ = write!(sql, " AND {predicate}");
    }

    let _ = write!(sql, " GROUP BY {key}");
    sql
}

fn quote_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(",")
}
