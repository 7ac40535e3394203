//! Sum/average/min/max aggregation over a result set.

use crate::db::{ColumnKind, ResultSet};

/// Aggregates for one numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub sum: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

/// Per-column aggregates in result-set column order. Non-numeric columns
/// carry no stats and render as "NA".
#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    entries: Vec<(String, Option<ColumnStats>)>,
}

impl Aggregates {
    /// Column names in result-set order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Stats for a numeric column, `None` for non-numeric or unknown names
    /// and for numeric columns that saw no values.
    pub fn stats(&self, column: &str) -> Option<&ColumnStats> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, stats)| stats.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&ColumnStats>)> {
        self.entries
            .iter()
            .map(|(name, stats)| (name.as_str(), stats.as_ref()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, stats)| stats.is_none())
    }
}

/// Single pass over the rows computing per-numeric-column sum, min and max;
/// the average is derived from the sum afterwards, so an empty result set
/// never divides by zero. Min and max are seeded from the first real value,
/// not from zero: a zero seed would win against all-positive minima and
/// all-negative maxima.
pub fn aggregate(result_set: &ResultSet) -> Aggregates {
    struct Acc {
        sum: f64,
        min: f64,
        max: f64,
        count: usize,
    }

    let mut accs: Vec<Option<Acc>> = result_set.columns.iter().map(|_| None).collect();

    for row in &result_set.rows {
        for (index, column) in result_set.columns.iter().enumerate() {
            if !column.kind.is_numeric() {
                continue;
            }
            let Some(value) = row.get(index).and_then(|cell| cell.as_f64()) else {
                continue;
            };

            match &mut accs[index] {
                Some(acc) => {
                    acc.sum += value;
                    acc.min = acc.min.min(value);
                    acc.max = acc.max.max(value);
                    acc.count += 1;
                }
                slot @ None => {
                    *slot = Some(Acc {
                        sum: value,
                        min: value,
                        max: value,
                        count: 1,
                    });
                }
            }
        }
    }

    let entries = result_set
        .columns
        .iter()
        .zip(accs)
        .map(|(column, acc)| {
            let stats = acc.map(|acc| ColumnStats {
                sum: acc.sum,
                avg: acc.sum / acc.count as f64,
                min: acc.min,
                max: acc.max,
            });
            (column.name.clone(), stats)
        })
        .collect();

    Aggregates { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Cell, ColumnInfo};

    fn result_set(values: &[&[Cell]]) -> ResultSet {
        let width = values.first().map(|r| r.len()).unwrap_or(0);
        let mut columns = vec![ColumnInfo {
            name: "time".to_string(),
            kind: ColumnKind::Text,
        }];
        for i in 1..width {
            columns.push(ColumnInfo {
                name: format!("col{i}"),
                kind: ColumnKind::Int,
            });
        }
        ResultSet {
            columns,
            rows: values.iter().map(|r| r.to_vec()).collect(),
        }
    }

    #[test]
    fn sums_and_averages_numeric_columns() {
        let rs = result_set(&[
            &[Cell::Text("20190101".into()), Cell::Int(10), Cell::Int(4)],
            &[Cell::Text("20190102".into()), Cell::Int(30), Cell::Int(2)],
        ]);
        let aggregates = aggregate(&rs);

        let stats = aggregates.stats("col1").unwrap();
        assert_eq!(stats.sum, 40.0);
        assert_eq!(stats.avg, 20.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);

        let stats = aggregates.stats("col2").unwrap();
        assert_eq!(stats.sum, 6.0);
        assert_eq!(stats.avg, 3.0);
    }

    #[test]
    fn empty_result_set_yields_no_stats_and_no_division() {
        let rs = ResultSet {
            columns: vec![
                ColumnInfo {
                    name: "time".to_string(),
                    kind: ColumnKind::Text,
                },
                ColumnInfo {
                    name: "input_files".to_string(),
                    kind: ColumnKind::Int,
                },
            ],
            rows: vec![],
        };
        let aggregates = aggregate(&rs);
        assert!(aggregates.is_empty());
        assert!(aggregates.stats("input_files").is_none());
        assert_eq!(aggregates.columns().count(), 2);
    }

    #[test]
    fn min_is_not_trapped_at_zero_for_positive_data() {
        let rs = result_set(&[
            &[Cell::Text("a".into()), Cell::Int(5)],
            &[Cell::Text("b".into()), Cell::Int(9)],
        ]);
        assert_eq!(aggregate(&rs).stats("col1").unwrap().min, 5.0);
    }

    #[test]
    fn max_is_not_trapped_at_zero_for_negative_data() {
        let rs = result_set(&[
            &[Cell::Text("a".into()), Cell::Int(-7)],
            &[Cell::Text("b".into()), Cell::Int(-3)],
        ]);
        let stats = aggregate(&rs).stats("col1").unwrap().to_owned();
        assert_eq!(stats.max, -3.0);
        assert_eq!(stats.min, -7.0);
        assert_eq!(stats.sum, -10.0);
    }

    #[test]
    fn non_numeric_columns_are_excluded() {
        let rs = result_set(&[&[Cell::Text("20190101".into()), Cell::Int(1)]]);
        let aggregates = aggregate(&rs);
        assert!(aggregates.stats("time").is_none());
        // Column order matches the result set.
        assert_eq!(
            aggregates.columns().collect::<Vec<_>>(),
            vec!["time", "col1"]
        );
    }

    #[test]
    fn null_cells_do_not_skew_the_average() {
        let rs = result_set(&[
            &[Cell::Text("a".into()), Cell::Int(10)],
            &[Cell::Text("b".into()), Cell::Null],
            &[Cell::Text("c".into()), Cell::Int(20)],
        ]);
        let stats = aggregate(&rs).stats("col1").unwrap().to_owned();
        assert_eq!(stats.sum, 30.0);
        assert_eq!(stats.avg, 15.0);
    }
}
