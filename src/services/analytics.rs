//! Analytical Store
//!
//! Thread-scoped analytical storage behind the `AnalyticalStore` interface:
//! configured read-only views plus per-thread scratch namespaces holding
//! tool-produced tables queryable with SQL. The in-process reference
//! implementation backs namespaces with in-memory tables and evaluates a
//! small SQL subset; production deployments bind the same interface to an
//! external engine.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Data Tables
// ============================================================================

/// Column-ordered result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl DataTable {
    pub fn new(columns: Vec<&str>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns: columns.into_iter().map(String::from).collect(), rows }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn head(&self, n: usize) -> DataTable {
        DataTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Tab-separated preview for model consumption. TSV is safest for
    /// free-text cells.
    pub fn preview_tsv(&self, limit: usize) -> String {
        let mut out = self.columns.join("\t");
        out.push('\n');
        for row in self.rows.iter().take(limit) {
            let line: Vec<String> = row
                .iter()
                .map(|v| match v {
                    Value::Null => "_".to_string(),
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            out.push_str(&line.join("\t"));
            out.push('\n');
        }
        out
    }
}

// ============================================================================
// Views
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewColumn {
    pub name: String,
    pub data_type: String,
    pub description: String,
}

/// A configured read-only view exposed to the agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDefinition {
    pub name: String,
    pub description: String,
    pub columns: Vec<ViewColumn>,
}

impl ViewDefinition {
    /// Full textual schema given to the model by `view_schema`.
    pub fn schema(&self) -> String {
        let mut out = format!("View `{}`: {}\nColumns:\n", self.name, self.description);
        for col in &self.columns {
            out.push_str(&format!("  - {} ({}): {}\n", col.name, col.data_type, col.description));
        }
        out
    }

    pub fn short_description(&self) -> String {
        format!("- `{}`: {}", self.name, self.description)
    }
}

/// Render the view catalog for prompt injection.
pub fn schema_listing(views: &[ViewDefinition], short: bool) -> String {
    if short {
        views.iter().map(|v| v.short_description()).collect::<Vec<_>>().join("\n")
    } else {
        views.iter().map(|v| v.schema()).collect::<Vec<_>>().join("\n")
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("No view found with the name '{name}'. Available views: {available:?}")]
    ViewNotFound { name: String, available: Vec<String> },

    #[error("No output found with the reference '{reference}'. Available outputs: {available:?}")]
    OutputNotFound { reference: String, available: Vec<String> },

    #[error("SQL error: {0}")]
    Sql(String),
}

// ============================================================================
// Store Interface
// ============================================================================

/// Analytical storage bound to a thread's scratch namespace.
///
/// Implementations must isolate namespaces from each other; a namespace name
/// is the thread id that owns it.
#[async_trait]
pub trait AnalyticalStore: Send + Sync {
    /// Configured view catalog.
    fn views(&self) -> Vec<ViewDefinition>;

    /// Execute SQL against a configured view.
    async fn execute_view(&self, view_name: &str, sql: &str) -> Result<DataTable, StoreError>;

    /// Store a table under `reference` in the namespace.
    async fn create_table(
        &self,
        namespace: &str,
        reference: &str,
        table: DataTable,
    ) -> Result<(), StoreError>;

    /// Execute SQL against previously stored tables in the namespace.
    async fn execute(&self, namespace: &str, sql: &str) -> Result<DataTable, StoreError>;

    /// Fetch a stored table by reference.
    async fn fetch(&self, namespace: &str, reference: &str) -> Result<DataTable, StoreError>;

    /// References stored in the namespace, in creation order.
    async fn list_outputs(&self, namespace: &str) -> Vec<String>;

    /// Release all resources held by the namespace.
    async fn drop_namespace(&self, namespace: &str);
}

// ============================================================================
// In-Memory Reference Implementation
// ============================================================================

/// In-memory store: views seeded at construction, scratch tables per
/// namespace, SQL evaluated by the built-in engine.
pub struct MemoryStore {
    views: HashMap<String, (ViewDefinition, DataTable)>,
    view_order: Vec<String>,
    namespaces: DashMap<String, BTreeMap<String, DataTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { views: HashMap::new(), view_order: Vec::new(), namespaces: DashMap::new() }
    }

    pub fn with_view(mut self, definition: ViewDefinition, data: DataTable) -> Self {
        self.view_order.push(definition.name.clone());
        self.views.insert(definition.name.clone(), (definition, data));
        self
    }

    /// Demo dataset used in development mode.
    pub fn with_default_views() -> Self {
        let overview = ViewDefinition {
            name: "application_overview".into(),
            description: "One row per application in the migration estate".into(),
            columns: vec![
                ViewColumn { name: "application".into(), data_type: "text".into(), description: "Application name".into() },
                ViewColumn { name: "app_type".into(), data_type: "text".into(), description: "Application type".into() },
                ViewColumn { name: "business_criticality".into(), data_type: "text".into(), description: "Business criticality".into() },
                ViewColumn { name: "server_count".into(), data_type: "integer".into(), description: "Number of servers".into() },
                ViewColumn { name: "owner".into(), data_type: "text".into(), description: "Application owner".into() },
            ],
        };
        let overview_data = DataTable::new(
            vec!["application", "app_type", "business_criticality", "server_count", "owner"],
            vec![
                vec!["Billing Portal".into(), "Web Application".into(), "high".into(), 4.into(), "Finance IT".into()],
                vec!["Inventory API".into(), "API".into(), "medium".into(), 2.into(), "Supply Chain".into()],
                vec!["Payroll Batch".into(), "Batch/ETL".into(), "mission_critical".into(), 3.into(), "HR Systems".into()],
            ],
        );

        let servers = ViewDefinition {
            name: "server_inventory".into(),
            description: "One row per discovered server".into(),
            columns: vec![
                ViewColumn { name: "server_name".into(), data_type: "text".into(), description: "Server host name".into() },
                ViewColumn { name: "application".into(), data_type: "text".into(), description: "Owning application".into() },
                ViewColumn { name: "environment".into(), data_type: "text".into(), description: "Deployment environment".into() },
                ViewColumn { name: "operating_system".into(), data_type: "text".into(), description: "Operating system".into() },
                ViewColumn { name: "cores".into(), data_type: "integer".into(), description: "CPU cores".into() },
                ViewColumn { name: "memory_gb".into(), data_type: "real".into(), description: "Memory in GB".into() },
                ViewColumn { name: "cpu_usage".into(), data_type: "real".into(), description: "Average CPU usage percent".into() },
            ],
        };
        let servers_data = DataTable::new(
            vec!["server_name", "application", "environment", "operating_system", "cores", "memory_gb", "cpu_usage"],
            vec![
                vec!["vm-bill-01".into(), "Billing Portal".into(), "prod".into(), "Windows Server 2019".into(), 8.into(), 32.0.into(), 54.0.into()],
                vec!["vm-bill-02".into(), "Billing Portal".into(), "prod".into(), "Windows Server 2019".into(), 8.into(), 32.0.into(), 61.0.into()],
                vec!["vm-inv-01".into(), "Inventory API".into(), "prod".into(), "Ubuntu 22.04".into(), 4.into(), 16.0.into(), 22.0.into()],
                vec!["vm-pay-01".into(), "Payroll Batch".into(), "prod".into(), "Windows Server 2016".into(), 16.into(), 64.0.into(), 78.0.into()],
            ],
        );

        let costs = ViewDefinition {
            name: "migration_costs".into(),
            description: "Current vs projected monthly run cost per application".into(),
            columns: vec![
                ViewColumn { name: "application".into(), data_type: "text".into(), description: "Application name".into() },
                ViewColumn { name: "current_monthly_cost".into(), data_type: "real".into(), description: "Current monthly cost (USD)".into() },
                ViewColumn { name: "projected_monthly_cost".into(), data_type: "real".into(), description: "Projected monthly cost after migration (USD)".into() },
            ],
        };
        let costs_data = DataTable::new(
            vec!["application", "current_monthly_cost", "projected_monthly_cost"],
            vec![
                vec!["Billing Portal".into(), 5200.0.into(), 3400.0.into()],
                vec!["Inventory API".into(), 1800.0.into(), 900.0.into()],
                vec!["Payroll Batch".into(), 4100.0.into(), 3900.0.into()],
            ],
        );

        Self::new()
            .with_view(overview, overview_data)
            .with_view(servers, servers_data)
            .with_view(costs, costs_data)
    }

    fn view_names(&self) -> Vec<String> {
        self.view_order.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalyticalStore for MemoryStore {
    fn views(&self) -> Vec<ViewDefinition> {
        self.view_order
            .iter()
            .filter_map(|name| self.views.get(name).map(|(def, _)| def.clone()))
            .collect()
    }

    async fn execute_view(&self, view_name: &str, sql: &str) -> Result<DataTable, StoreError> {
        let (_, data) = self.views.get(view_name).ok_or_else(|| StoreError::ViewNotFound {
            name: view_name.to_string(),
            available: self.view_names(),
        })?;
        let mut tables = HashMap::new();
        tables.insert(view_name.to_string(), data);
        sql::execute(sql, &tables)
    }

    async fn create_table(
        &self,
        namespace: &str,
        reference: &str,
        table: DataTable,
    ) -> Result<(), StoreError> {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(reference.to_string(), table);
        Ok(())
    }

    async fn execute(&self, namespace: &str, sql_text: &str) -> Result<DataTable, StoreError> {
        let entry = self.namespaces.get(namespace);
        let empty = BTreeMap::new();
        let outputs = entry.as_ref().map(|e| e.value()).unwrap_or(&empty);
        let tables: HashMap<String, &DataTable> =
            outputs.iter().map(|(k, v)| (k.clone(), v)).collect();
        sql::execute(sql_text, &tables).map_err(|e| match e {
            // The engine reports unknown tables as SQL errors; in namespace
            // scope that is an unknown output reference.
            StoreError::Sql(msg) if msg.starts_with("unknown table") => StoreError::OutputNotFound {
                reference: msg.trim_start_matches("unknown table ").trim_matches('\'').to_string(),
                available: outputs.keys().cloned().collect(),
            },
            other => other,
        })
    }

    async fn fetch(&self, namespace: &str, reference: &str) -> Result<DataTable, StoreError> {
        let entry = self.namespaces.get(namespace);
        let available: Vec<String> = entry
            .as_ref()
            .map(|e| e.value().keys().cloned().collect())
            .unwrap_or_default();
        entry
            .as_ref()
            .and_then(|e| e.value().get(reference).cloned())
            .ok_or_else(|| StoreError::OutputNotFound {
                reference: reference.to_string(),
                available,
            })
    }

    async fn list_outputs(&self, namespace: &str) -> Vec<String> {
        self.namespaces
            .get(namespace)
            .map(|e| e.value().keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn drop_namespace(&self, namespace: &str) {
        self.namespaces.remove(namespace);
    }
}

// ============================================================================
// SQL Subset Engine
// ============================================================================

/// Evaluator for the SQL subset the scratch store supports:
/// `SELECT <cols|*|aggregates> FROM <table> [WHERE <conjunction>]
/// [ORDER BY <col> [ASC|DESC]] [LIMIT <n>]`.
mod sql {
    use super::{DataTable, StoreError};
    use serde_json::Value;
    use std::cmp::Ordering;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq)]
    enum Token {
        Ident(String),
        Str(String),
        Number(f64),
        Symbol(String),
    }

    fn tokenize(input: &str) -> Result<Vec<Token>, StoreError> {
        let mut tokens = Vec::new();
        let chars: Vec<char> = input.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c.is_whitespace() {
                i += 1;
            } else if c == '\'' {
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(StoreError::Sql("unterminated string literal".into()));
                }
                i += 1;
                tokens.push(Token::Str(s));
            } else if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) {
                let mut s = String::from(c);
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    s.push(chars[i]);
                    i += 1;
                }
                let n = s.parse().map_err(|_| StoreError::Sql(format!("bad number: {}", s)))?;
                tokens.push(Token::Number(n));
            } else if c.is_alphabetic() || c == '_' || c == '"' || c == '`' {
                // Quoted and bare identifiers
                let quote = (c == '"' || c == '`').then_some(c);
                let mut s = String::new();
                if quote.is_some() {
                    i += 1;
                    while i < chars.len() && Some(chars[i]) != quote {
                        s.push(chars[i]);
                        i += 1;
                    }
                    i += 1;
                } else {
                    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                        s.push(chars[i]);
                        i += 1;
                    }
                }
                tokens.push(Token::Ident(s));
            } else {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                if two == "<=" || two == ">=" || two == "!=" || two == "<>" {
                    tokens.push(Token::Symbol(two));
                    i += 2;
                } else {
                    tokens.push(Token::Symbol(c.to_string()));
                    i += 1;
                }
            }
        }
        Ok(tokens)
    }

    #[derive(Debug, Clone)]
    enum SelectItem {
        Star,
        Column(String),
        Aggregate { func: String, column: Option<String> },
    }

    #[derive(Debug, Clone)]
    struct Condition {
        column: String,
        op: String,
        value: Value,
    }

    #[derive(Debug, Clone)]
    struct Query {
        items: Vec<SelectItem>,
        table: String,
        conditions: Vec<Condition>,
        order_by: Option<(String, bool)>,
        limit: Option<usize>,
    }

    struct Parser {
        tokens: Vec<Token>,
        pos: usize,
    }

    impl Parser {
        fn peek(&self) -> Option<&Token> {
            self.tokens.get(self.pos)
        }

        fn next(&mut self) -> Option<Token> {
            let t = self.tokens.get(self.pos).cloned();
            if t.is_some() {
                self.pos += 1;
            }
            t
        }

        fn keyword(&mut self, kw: &str) -> bool {
            if let Some(Token::Ident(s)) = self.peek()
                && s.eq_ignore_ascii_case(kw)
            {
                self.pos += 1;
                return true;
            }
            false
        }

        fn expect_ident(&mut self, what: &str) -> Result<String, StoreError> {
            match self.next() {
                Some(Token::Ident(s)) => Ok(s),
                other => Err(StoreError::Sql(format!("expected {}, found {:?}", what, other))),
            }
        }

        fn symbol(&mut self, sym: &str) -> bool {
            if let Some(Token::Symbol(s)) = self.peek()
                && s == sym
            {
                self.pos += 1;
                return true;
            }
            false
        }

        fn parse(mut self) -> Result<Query, StoreError> {
            if !self.keyword("select") {
                return Err(StoreError::Sql("only SELECT statements are supported".into()));
            }

            let mut items = Vec::new();
            loop {
                if self.symbol("*") {
                    items.push(SelectItem::Star);
                } else {
                    let ident = self.expect_ident("column name")?;
                    let upper = ident.to_uppercase();
                    if matches!(upper.as_str(), "COUNT" | "SUM" | "AVG" | "MIN" | "MAX")
                        && self.symbol("(")
                    {
                        let column = if self.symbol("*") {
                            None
                        } else {
                            Some(self.expect_ident("aggregate column")?)
                        };
                        if !self.symbol(")") {
                            return Err(StoreError::Sql("expected ')' after aggregate".into()));
                        }
                        items.push(SelectItem::Aggregate { func: upper, column });
                    } else {
                        items.push(SelectItem::Column(ident));
                    }
                }
                if !self.symbol(",") {
                    break;
                }
            }

            if !self.keyword("from") {
                return Err(StoreError::Sql("expected FROM clause".into()));
            }
            let table = self.expect_ident("table name")?;

            let mut conditions = Vec::new();
            if self.keyword("where") {
                loop {
                    let column = self.expect_ident("condition column")?;
                    let op = match self.next() {
                        Some(Token::Symbol(s)) => s,
                        Some(Token::Ident(s)) if s.eq_ignore_ascii_case("like") => "like".into(),
                        other => {
                            return Err(StoreError::Sql(format!(
                                "expected comparison operator, found {:?}",
                                other
                            )));
                        },
                    };
                    let value = match self.next() {
                        Some(Token::Str(s)) => Value::String(s),
                        Some(Token::Number(n)) => serde_json::json!(n),
                        Some(Token::Ident(s)) if s.eq_ignore_ascii_case("null") => Value::Null,
                        Some(Token::Ident(s)) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
                        Some(Token::Ident(s)) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
                        other => {
                            return Err(StoreError::Sql(format!(
                                "expected literal, found {:?}",
                                other
                            )));
                        },
                    };
                    conditions.push(Condition { column, op, value });
                    if !self.keyword("and") {
                        break;
                    }
                }
            }

            let mut order_by = None;
            if self.keyword("order") {
                if !self.keyword("by") {
                    return Err(StoreError::Sql("expected BY after ORDER".into()));
                }
                let col = self.expect_ident("order column")?;
                let descending = if self.keyword("desc") {
                    true
                } else {
                    self.keyword("asc");
                    false
                };
                order_by = Some((col, descending));
            }

            let mut limit = None;
            if self.keyword("limit") {
                match self.next() {
                    Some(Token::Number(n)) if n >= 0.0 => limit = Some(n as usize),
                    other => {
                        return Err(StoreError::Sql(format!("expected limit count, found {:?}", other)));
                    },
                }
            }

            if let Some(t) = self.peek() {
                return Err(StoreError::Sql(format!("unexpected trailing token: {:?}", t)));
            }

            Ok(Query { items, table, conditions, order_by, limit })
        }
    }

    fn compare(a: &Value, b: &Value) -> Ordering {
        match (a, b) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .unwrap_or(f64::NAN)
                .partial_cmp(&y.as_f64().unwrap_or(f64::NAN))
                .unwrap_or(Ordering::Equal),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ => a.to_string().cmp(&b.to_string()),
        }
    }

    fn matches_condition(cell: &Value, cond: &Condition) -> bool {
        if cond.op == "like" {
            let (Value::String(text), Value::String(pattern)) = (cell, &cond.value) else {
                return false;
            };
            let text = text.to_lowercase();
            let pattern = pattern.to_lowercase();
            let starts = pattern.starts_with('%');
            let ends = pattern.ends_with('%');
            let inner = pattern.trim_matches('%');
            return match (starts, ends) {
                (true, true) => text.contains(inner),
                (true, false) => text.ends_with(inner),
                (false, true) => text.starts_with(inner),
                (false, false) => text == inner,
            };
        }

        let ord = compare(cell, &cond.value);
        match cond.op.as_str() {
            "=" => ord == Ordering::Equal,
            "!=" | "<>" => ord != Ordering::Equal,
            "<" => ord == Ordering::Less,
            "<=" => ord != Ordering::Greater,
            ">" => ord == Ordering::Greater,
            ">=" => ord != Ordering::Less,
            _ => false,
        }
    }

    pub fn execute(
        sql_text: &str,
        tables: &HashMap<String, &DataTable>,
    ) -> Result<DataTable, StoreError> {
        let statement = sql_text.trim().trim_end_matches(';');
        let tokens = tokenize(statement)?;
        let query = Parser { tokens, pos: 0 }.parse()?;

        let table = tables
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&query.table))
            .map(|(_, t)| *t)
            .ok_or_else(|| StoreError::Sql(format!("unknown table '{}'", query.table)))?;

        // Filter
        let mut condition_indices = Vec::new();
        for cond in &query.conditions {
            let idx = table.column_index(&cond.column).ok_or_else(|| {
                StoreError::Sql(format!("unknown column '{}' in WHERE", cond.column))
            })?;
            condition_indices.push(idx);
        }
        let mut rows: Vec<&Vec<Value>> = table
            .rows
            .iter()
            .filter(|row| {
                query
                    .conditions
                    .iter()
                    .zip(&condition_indices)
                    .all(|(cond, idx)| matches_condition(&row[*idx], cond))
            })
            .collect();

        // Order
        if let Some((col, descending)) = &query.order_by {
            let idx = table
                .column_index(col)
                .ok_or_else(|| StoreError::Sql(format!("unknown column '{}' in ORDER BY", col)))?;
            rows.sort_by(|a, b| {
                let ord = compare(&a[idx], &b[idx]);
                if *descending { ord.reverse() } else { ord }
            });
        }

        // Limit
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        // Aggregates collapse to a single row
        let has_aggregate = query
            .items
            .iter()
            .any(|i| matches!(i, SelectItem::Aggregate { .. }));
        if has_aggregate {
            let mut columns = Vec::new();
            let mut out_row = Vec::new();
            for item in &query.items {
                let SelectItem::Aggregate { func, column } = item else {
                    return Err(StoreError::Sql(
                        "cannot mix aggregates and plain columns without GROUP BY".into(),
                    ));
                };
                let label = match column {
                    Some(c) => format!("{}({})", func.to_lowercase(), c),
                    None => format!("{}(*)", func.to_lowercase()),
                };
                columns.push(label);
                out_row.push(evaluate_aggregate(func, column.as_deref(), table, &rows)?);
            }
            return Ok(DataTable { columns, rows: vec![out_row] });
        }

        // Projection
        let mut out_columns = Vec::new();
        let mut indices = Vec::new();
        for item in &query.items {
            match item {
                SelectItem::Star => {
                    for (i, name) in table.columns.iter().enumerate() {
                        out_columns.push(name.clone());
                        indices.push(i);
                    }
                },
                SelectItem::Column(name) => {
                    let idx = table
                        .column_index(name)
                        .ok_or_else(|| StoreError::Sql(format!("unknown column '{}'", name)))?;
                    out_columns.push(table.columns[idx].clone());
                    indices.push(idx);
                },
                SelectItem::Aggregate { .. } => unreachable!(),
            }
        }

        let out_rows = rows
            .into_iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(DataTable { columns: out_columns, rows: out_rows })
    }

    fn evaluate_aggregate(
        func: &str,
        column: Option<&str>,
        table: &DataTable,
        rows: &[&Vec<Value>],
    ) -> Result<Value, StoreError> {
        if func == "COUNT" && column.is_none() {
            return Ok(serde_json::json!(rows.len()));
        }
        let col = column.ok_or_else(|| StoreError::Sql(format!("{}(*) is not supported", func)))?;
        let idx = table
            .column_index(col)
            .ok_or_else(|| StoreError::Sql(format!("unknown column '{}' in aggregate", col)))?;

        if func == "COUNT" {
            let n = rows.iter().filter(|r| !r[idx].is_null()).count();
            return Ok(serde_json::json!(n));
        }

        let numbers: Vec<f64> = rows.iter().filter_map(|r| r[idx].as_f64()).collect();
        let result = match func {
            "SUM" => numbers.iter().sum::<f64>(),
            "AVG" => {
                if numbers.is_empty() {
                    return Ok(Value::Null);
                }
                numbers.iter().sum::<f64>() / numbers.len() as f64
            },
            "MIN" => {
                let Some(min) = numbers.iter().cloned().reduce(f64::min) else {
                    return Ok(Value::Null);
                };
                min
            },
            "MAX" => {
                let Some(max) = numbers.iter().cloned().reduce(f64::max) else {
                    return Ok(Value::Null);
                };
                max
            },
            other => return Err(StoreError::Sql(format!("unsupported aggregate {}", other))),
        };
        Ok(serde_json::json!(result))
    }
}
