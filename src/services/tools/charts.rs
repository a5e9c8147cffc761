//! Chart Specifications
//!
//! Builds renderable chart specs from stored tables. Validation failures
//! surface as retryable tool errors so the model can correct its column
//! choices.

use serde::{Deserialize, Serialize};

use crate::services::analytics::DataTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Bar,
    Line,
    Doughnut,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Doughnut => "doughnut",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "bar" => Some(Self::Bar),
            "line" => Some(Self::Line),
            "doughnut" | "donut" => Some(Self::Doughnut),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<f64>,
}

/// Renderable chart specification sent to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSpec {
    pub chart_type: ChartType,
    pub title: String,
    /// X-axis labels (or slice labels for doughnut charts).
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

impl ChartSpec {
    /// Build a chart spec from a stored table.
    ///
    /// The `x_col` values become labels; each column in `y_cols` becomes a
    /// dataset. Doughnut charts take exactly one value column.
    pub fn from_table(
        chart_type: ChartType,
        table: &DataTable,
        title: &str,
        x_col: &str,
        y_cols: &[String],
    ) -> Result<Self, String> {
        if table.rows.is_empty() {
            return Err("cannot generate a chart from empty data".to_string());
        }
        if y_cols.is_empty() {
            return Err("at least one value column is required".to_string());
        }
        if chart_type == ChartType::Doughnut && y_cols.len() != 1 {
            return Err("doughnut charts take exactly one value column".to_string());
        }

        let mut missing = Vec::new();
        let x_index = table.column_index(x_col);
        if x_index.is_none() {
            missing.push(format!("label column '{}'", x_col));
        }
        let mut y_indices = Vec::new();
        for y in y_cols {
            match table.column_index(y) {
                Some(idx) => y_indices.push((y.clone(), idx)),
                None => missing.push(format!("value column '{}'", y)),
            }
        }
        if !missing.is_empty() {
            return Err(format!(
                "column(s) not found: {}. Available columns: {:?}",
                missing.join(", "),
                table.columns
            ));
        }
        let x_index = x_index.expect("checked above");

        let labels: Vec<String> = table
            .rows
            .iter()
            .map(|row| match &row[x_index] {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();

        let mut datasets = Vec::with_capacity(y_indices.len());
        for (label, idx) in y_indices {
            let mut data = Vec::with_capacity(table.rows.len());
            for row in &table.rows {
                let value = row[idx].as_f64().ok_or_else(|| {
                    format!(
                        "value column '{}' contains non-numeric data; chart values must be numbers",
                        label
                    )
                })?;
                data.push(value);
            }
            datasets.push(ChartDataset { label, data });
        }

        Ok(Self { chart_type, title: title.to_string(), labels, datasets })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DataTable {
        DataTable::new(
            vec!["name", "score", "cost"],
            vec![
                vec!["arch-a".into(), 81.5.into(), 1200.0.into()],
                vec!["arch-b".into(), 64.0.into(), 800.0.into()],
            ],
        )
    }

    #[test]
    fn test_bar_chart_with_two_series() {
        let spec = ChartSpec::from_table(
            ChartType::Bar,
            &table(),
            "Scores",
            "name",
            &["score".to_string(), "cost".to_string()],
        )
        .unwrap();
        assert_eq!(spec.labels, vec!["arch-a", "arch-b"]);
        assert_eq!(spec.datasets.len(), 2);
        assert_eq!(spec.datasets[0].data, vec![81.5, 64.0]);
    }

    #[test]
    fn test_doughnut_requires_single_series() {
        let err = ChartSpec::from_table(
            ChartType::Doughnut,
            &table(),
            "Split",
            "name",
            &["score".to_string(), "cost".to_string()],
        )
        .unwrap_err();
        assert!(err.contains("exactly one"));
    }

    #[test]
    fn test_missing_columns_are_named() {
        let err = ChartSpec::from_table(
            ChartType::Bar,
            &table(),
            "Scores",
            "label",
            &["points".to_string()],
        )
        .unwrap_err();
        assert!(err.contains("label column 'label'"));
        assert!(err.contains("value column 'points'"));
    }

    #[test]
    fn test_non_numeric_values_rejected() {
        let err = ChartSpec::from_table(
            ChartType::Bar,
            &table(),
            "Names",
            "score",
            &["name".to_string()],
        )
        .unwrap_err();
        assert!(err.contains("non-numeric"));
    }

    #[test]
    fn test_empty_table_rejected() {
        let empty = DataTable::new(vec!["a"], vec![]);
        let err =
            ChartSpec::from_table(ChartType::Bar, &empty, "t", "a", &["a".to_string()]).unwrap_err();
        assert!(err.contains("empty"));
    }
}
