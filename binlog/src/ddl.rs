//! DDL tracker (§4.4): interprets `QUERY_EVENT` SQL text, maintains
//! versioned `TableCreate` definitions, and persists them to a sidecar file.
//!
//! Grounded on the teacher's regex-based `QUERY_EVENT` handling
//! (`events/protocol/query_event.rs`) but narrowed to the structural
//! recognition this converter actually needs: CREATE/ALTER TABLE, not
//! general SQL parsing.

use crate::gtid::Gtid;
use common::err::{CResult, ReError};
use common::file_util::write_atomic;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

lazy_static! {
    static ref CREATE_RE: Regex =
        Regex::new(r"(?is)^\s*create\s+(or\s+replace\s+)?(temporary\s+)?table\s+").unwrap();
    static ref ALTER_RE: Regex =
        Regex::new(r"(?is)^\s*alter\s+(online\s+)?(ignore\s+)?table\s+").unwrap();
    static ref IDENT_RE: Regex = Regex::new(r"^[`\w.]+").unwrap();
}

const SKIPPED_LEADERS: &[&str] = &[
    "PRIMARY", "KEY", "INDEX", "CONSTRAINT", "FOREIGN", "UNIQUE", "FULLTEXT", "SPATIAL",
];

/// One per `database.table` ever observed, mutated only by the DDL tracker
/// (§3). `version` increments on every schema-affecting change; the
/// table-map registry copies it into each `TableMap` it creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCreate {
    pub database: String,
    pub table: String,
    pub column_names: Vec<String>,
    pub ddl_text: String,
    pub version: u32,
    pub changed_at: Gtid,
}

impl TableCreate {
    pub fn key(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }
}

/// Strips `/* ... */` and `-- ...` comments and unifies whitespace to single
/// spaces, as the framer's DDL recognition requires (§4.4).
pub fn normalize_sql(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"/*") {
            if let Some(end) = raw[i..].find("*/") {
                i += end + 2;
                continue;
            } else {
                break;
            }
        }
        if bytes[i..].starts_with(b"--") {
            if let Some(end) = raw[i..].find('\n') {
                i += end;
                continue;
            } else {
                break;
            }
        }
        let c = bytes[i] as char;
        out.push(if c.is_whitespace() { ' ' } else { c });
        i += 1;
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits a qualified `db.table` or bare `table` identifier, backticks stripped.
fn split_identifier(default_db: &str, ident: &str) -> (String, String) {
    let ident = ident.trim_matches('`');
    match ident.split_once('.') {
        Some((db, table)) => (db.trim_matches('`').to_string(), table.trim_matches('`').to_string()),
        None => (default_db.to_string(), ident.to_string()),
    }
}

/// Extracts the parenthesized column list between the outermost `(` and its
/// matching `)`, tracking nesting depth so `ENUM('a','b,c')` and
/// `DECIMAL(10,2)` don't split prematurely (§4.4).
fn extract_paren_block(sql: &str) -> Option<&str> {
    let start = sql.find('(')?;
    let bytes = sql.as_bytes();
    let mut depth = 0i32;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&sql[start + 1..start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits `block` on top-level commas (depth-tracked, parens only) and
/// returns each item's leading bare identifier when it names a column.
fn parse_column_names(block: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let bytes = block.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth -= 1,
            b',' if depth == 0 => {
                items.push(block[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(block[start..].trim());

    items
        .into_iter()
        .filter_map(|item| {
            let leader = item.split_whitespace().next()?;
            let leader_upper = leader.trim_matches('`').to_uppercase();
            if SKIPPED_LEADERS.contains(&leader_upper.as_str()) {
                return None;
            }
            Some(leader.trim_matches('`').to_string())
        })
        .collect()
}

/// Column-list delta instructions applied by `ALTER TABLE` (§4.4): add,
/// drop, or rename, applied to `column_names` in source order.
#[derive(Debug, Clone)]
pub enum AlterOp {
    AddColumn(String),
    DropColumn(String),
    RenameColumn { from: String, to: String },
}

fn parse_alter_ops(sql_after_table_name: &str) -> Vec<AlterOp> {
    let mut ops = Vec::new();
    for clause in sql_after_table_name.split(',') {
        let clause = clause.trim();
        let lower = clause.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("add column ").or_else(|| lower.strip_prefix("add ")) {
            if let Some(name) = rest.split_whitespace().next() {
                let offset = clause.len() - rest.len();
                ops.push(AlterOp::AddColumn(clause[offset..][..name.len()].to_string()));
            }
        } else if let Some(rest) = lower
            .strip_prefix("drop column ")
            .or_else(|| lower.strip_prefix("drop "))
        {
            if let Some(name) = rest.split_whitespace().next() {
                let offset = clause.len() - rest.len();
                ops.push(AlterOp::DropColumn(clause[offset..][..name.len()].to_string()));
            }
        } else if let Some(rest) = lower
            .strip_prefix("change column ")
            .or_else(|| lower.strip_prefix("change "))
        {
            let mut parts = rest.split_whitespace();
            if let (Some(from), Some(to)) = (parts.next(), parts.next()) {
                ops.push(AlterOp::RenameColumn {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }
    }
    ops
}

/// Tracks every `TableCreate` observed so far, keyed by `database.table`.
pub struct DdlTracker {
    tables: HashMap<String, TableCreate>,
    sidecar_path: String,
}

impl DdlTracker {
    pub fn new(sidecar_path: impl Into<String>) -> Self {
        DdlTracker {
            tables: HashMap::new(),
            sidecar_path: sidecar_path.into(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&TableCreate> {
        self.tables.get(key)
    }

    /// Handles one `QUERY_EVENT`'s SQL text, returning the affected table's
    /// new definition if the statement was a recognized CREATE or ALTER.
    pub fn handle_query(&mut self, default_db: &str, sql: &str, gtid: Gtid) -> CResult<Option<TableCreate>> {
        let normalized = normalize_sql(sql);

        if CREATE_RE.is_match(&normalized) {
            return self.handle_create(default_db, &normalized, gtid).map(Some);
        }
        if ALTER_RE.is_match(&normalized) {
            return self.handle_alter(default_db, &normalized, gtid).map(Some);
        }
        Ok(None)
    }

    fn handle_create(&mut self, default_db: &str, sql: &str, gtid: Gtid) -> CResult<TableCreate> {
        let after_keyword = &sql[CREATE_RE.find(sql).unwrap().end()..];
        let ident = IDENT_RE
            .find(after_keyword)
            .ok_or_else(|| ReError::new("CREATE TABLE missing identifier"))?
            .as_str();
        let (database, table) = split_identifier(default_db, ident);

        let block = extract_paren_block(after_keyword)
            .ok_or_else(|| ReError::new("CREATE TABLE missing column list"))?;
        let column_names = parse_column_names(block);

        let version = self
            .tables
            .get(&format!("{database}.{table}"))
            .map(|t| t.version + 1)
            .unwrap_or(1);

        let create = TableCreate {
            database,
            table,
            column_names,
            ddl_text: sql.to_string(),
            version,
            changed_at: gtid,
        };
        self.tables.insert(create.key(), create.clone());
        self.persist()?;
        Ok(create)
    }

    fn handle_alter(&mut self, default_db: &str, sql: &str, gtid: Gtid) -> CResult<TableCreate> {
        let after_keyword = &sql[ALTER_RE.find(sql).unwrap().end()..];
        let ident = IDENT_RE
            .find(after_keyword)
            .ok_or_else(|| ReError::new("ALTER TABLE missing identifier"))?
            .as_str();
        let (database, table) = split_identifier(default_db, ident);
        let key = format!("{database}.{table}");

        let mut create = self
            .tables
            .get(&key)
            .cloned()
            .ok_or_else(|| ReError::UnknownTable(key.clone()))?;

        let rest = after_keyword[ident.len()..].trim_start();
        for op in parse_alter_ops(rest) {
            match op {
                AlterOp::AddColumn(name) => create.column_names.push(name),
                AlterOp::DropColumn(name) => create.column_names.retain(|c| c != &name),
                AlterOp::RenameColumn { from, to } => {
                    if let Some(slot) = create.column_names.iter_mut().find(|c| **c == from) {
                        *slot = to;
                    }
                }
            }
        }
        create.ddl_text = sql.to_string();
        create.version += 1;
        create.changed_at = gtid;

        self.tables.insert(key, create.clone());
        self.persist()?;
        Ok(create)
    }

    /// Writes the definitive list of CREATE statements to the sidecar file,
    /// one JSON line per table, via write-temp-then-rename (§3, §9).
    fn persist(&self) -> CResult<()> {
        let mut buf = String::new();
        for create in self.tables.values() {
            buf.push_str(&serde_json::to_string(create).map_err(|e| ReError::new(e.to_string()))?);
            buf.push('\n');
        }
        write_atomic(&self.sidecar_path, buf.as_bytes())
    }
}
