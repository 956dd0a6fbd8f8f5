//! Command list parsing.
//!
//! A *command list* is the ordered list of command strings a control device
//! records, one per acquisition step (e.g. `"FREQ 50.0 VOLT 20"`). The
//! [`CommandListParser`] decomposes such a list into typed, named columns by
//! applying user supplied regular expressions.
//!
//! # Pattern contract
//!
//! Every pattern defines exactly two named groups:
//!
//! - `VALUE`: the value of the column for that row (the legacy name `VAL` is
//!   accepted as well), and
//! - a second group whose name becomes the column name, e.g. `FREQ`. The
//!   substring matched by this group is what gets removed from the row.
//!
//! ```text
//! (?P<FREQ>(\bFREQ\s)(?P<VALUE>(\d+\.\d*|\.\d+|\d+\b)))
//! ```
//!
//! # Algorithm
//!
//! Parsing keeps a working `remainder` column holding the text of each row not
//! yet claimed by an accepted column. Columns are processed in declaration
//! order and each one searches the current remainder text. A column is
//! accepted (and the remainder narrowed) only if it matched every row with
//! values of a single type. Once some row is fully consumed the remainder is
//! retired and no further column can be extracted.
//!
//! The parse succeeds only if at least one named column survives; a result
//! holding nothing but the remainder counts as failure, and failure always
//! yields an empty column set.

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::dtype::DType;
use crate::error::{CommandListError, PatternError};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt::{self, Write as _};

/// Reserved name of the column holding unmatched text.
pub const REMAINDER: &str = "remainder";

// =============================================================================
// Command list
// =============================================================================

/// Ordered command strings, one per acquisition step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CommandList(Vec<String>);

impl CommandList {
    /// Command list holding `commands` verbatim.
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(commands.into_iter().map(Into::into).collect())
    }

    /// Split a multi-line attribute value into commands, trimming each line.
    pub fn from_multiline(text: &str) -> Self {
        Self(text.lines().map(|line| line.trim().to_string()).collect())
    }

    /// Commands as a slice.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Fixed-width string type able to hold every command.
    pub fn dtype(&self) -> DType {
        DType::string_for(self.0.iter().map(String::as_str))
    }
}

impl From<&str> for CommandList {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for CommandList {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<String>> for CommandList {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<Vec<&str>> for CommandList {
    fn from(value: Vec<&str>) -> Self {
        Self::new(value)
    }
}

impl From<&[&str]> for CommandList {
    fn from(value: &[&str]) -> Self {
        Self::new(value.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for CommandList {
    fn from(value: [&str; N]) -> Self {
        Self::new(value)
    }
}

impl TryFrom<serde_json::Value> for CommandList {
    type Error = CommandListError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::String(s) => Ok(Self(vec![s])),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => Ok(s),
                    other => Err(CommandListError(format!("non-string element {other}"))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self),
            other => Err(CommandListError(format!("got {other}"))),
        }
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// Patterns
// =============================================================================

/// A compiled, validated command list pattern.
#[derive(Debug, Clone)]
pub struct PatternDescriptor {
    regex: Regex,
    name_group: String,
    value_group: &'static str,
}

impl PatternDescriptor {
    /// Name of the value group.
    pub const VALUE_GROUP: &'static str = "VALUE";
    /// Legacy spelling of the value group.
    pub const LEGACY_VALUE_GROUP: &'static str = "VAL";

    /// Compile `pattern` and resolve which named group is the value and which
    /// is the column name.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let regex = Regex::new(pattern).map_err(|source| PatternError::Invalid {
            pattern: pattern.to_string(),
            source: Box::new(source),
        })?;

        let names: Vec<&str> = regex.capture_names().flatten().collect();
        if names.len() != 2 {
            return Err(PatternError::GroupCount {
                pattern: pattern.to_string(),
                found: names.len(),
            });
        }

        let value_group = if names.contains(&Self::VALUE_GROUP) {
            Self::VALUE_GROUP
        } else if names.contains(&Self::LEGACY_VALUE_GROUP) {
            Self::LEGACY_VALUE_GROUP
        } else {
            return Err(PatternError::MissingValueGroup {
                pattern: pattern.to_string(),
            });
        };

        let name_group = names
            .iter()
            .find(|name| **name != value_group)
            .map(|name| (*name).to_string())
            .ok_or_else(|| PatternError::GroupCount {
                pattern: pattern.to_string(),
                found: 1,
            })?;

        if name_group.to_lowercase() == REMAINDER {
            return Err(PatternError::ReservedName { name: name_group });
        }

        Ok(Self {
            regex,
            name_group,
            value_group,
        })
    }

    /// Column name defined by the pattern.
    pub fn name(&self) -> &str {
        &self.name_group
    }

    /// Name of the group capturing the value, always `VALUE`.
    pub fn value_group(&self) -> &str {
        self.value_group
    }

    /// Source text of the pattern.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Compiled pattern.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Search `text`, returning the coerced value and the substring matched
    /// by the name group. `None` if the pattern (or its name group) does not
    /// match.
    fn extract<'t>(&self, text: &'t str) -> Option<(Option<ColumnValue>, &'t str)> {
        let caps = self.regex.captures(text)?;
        let matched = caps.name(&self.name_group)?.as_str();
        let value = caps
            .name(self.value_group)
            .and_then(|m| ColumnValue::coerce(m.as_str()));
        Some((value, matched))
    }
}

impl PartialEq for PatternDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for PatternDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for PatternDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, de-duplicated set of pattern strings.
///
/// Accepts a single pattern or any collection of patterns. Duplicates are
/// dropped keeping the first occurrence, so processing order is the
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet(Vec<String>);

impl PatternSet {
    /// Set of `patterns` with repeats dropped, keeping first occurrences.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        Self(
            patterns
                .into_iter()
                .map(Into::into)
                .filter(|p| seen.insert(p.clone()))
                .collect(),
        )
    }

    /// Iterate in order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Number of distinct patterns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compile and validate every pattern.
    ///
    /// Fails on the first malformed pattern, reserved column name, or column
    /// name shared by two patterns.
    pub fn compile(&self) -> Result<Vec<PatternDescriptor>, PatternError> {
        let mut names = HashSet::new();
        let mut compiled = Vec::with_capacity(self.0.len());
        for pattern in &self.0 {
            let descriptor = PatternDescriptor::compile(pattern)?;
            if !names.insert(descriptor.name().to_string()) {
                return Err(PatternError::DuplicateName {
                    name: descriptor.name().to_string(),
                });
            }
            compiled.push(descriptor);
        }
        Ok(compiled)
    }
}

impl From<&str> for PatternSet {
    fn from(value: &str) -> Self {
        Self::new([value])
    }
}

impl From<String> for PatternSet {
    fn from(value: String) -> Self {
        Self::new([value])
    }
}

impl From<&String> for PatternSet {
    fn from(value: &String) -> Self {
        Self::new([value.as_str()])
    }
}

impl From<Vec<String>> for PatternSet {
    fn from(value: Vec<String>) -> Self {
        Self::new(value)
    }
}

impl From<Vec<&str>> for PatternSet {
    fn from(value: Vec<&str>) -> Self {
        Self::new(value)
    }
}

impl From<&[&str]> for PatternSet {
    fn from(value: &[&str]) -> Self {
        Self::new(value.iter().copied())
    }
}

impl From<&[String]> for PatternSet {
    fn from(value: &[String]) -> Self {
        Self::new(value.iter().cloned())
    }
}

impl<const N: usize> From<[&str; N]> for PatternSet {
    fn from(value: [&str; N]) -> Self {
        Self::new(value)
    }
}

impl<S: Into<String>> FromIterator<S> for PatternSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter)
    }
}

// =============================================================================
// Columns
// =============================================================================

/// One extracted value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    /// Numeric value.
    Float(f64),
    /// Anything that does not parse as a number.
    Str(String),
}

impl ColumnValue {
    /// Convert a captured value: a float when it parses as one, otherwise the
    /// trimmed string. An empty string is no value at all.
    pub fn coerce(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Ok(v) = trimmed.parse::<f64>() {
            return Some(ColumnValue::Float(v));
        }
        if trimmed.is_empty() {
            None
        } else {
            Some(ColumnValue::Str(trimmed.to_string()))
        }
    }

    /// Numeric value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Float(v) => Some(*v),
            ColumnValue::Str(_) => None,
        }
    }

    /// String value, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ColumnValue::Str(s) => Some(s),
            ColumnValue::Float(_) => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ColumnValue::Float(_) => "float",
            ColumnValue::Str(_) => "str",
        }
    }

    fn same_type(&self, other: &ColumnValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Float(v) => write!(f, "{v:?}"),
            ColumnValue::Str(s) => f.write_str(s),
        }
    }
}

/// A fully parsed, frozen column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnResult {
    name: String,
    #[serde(rename = "re pattern")]
    pattern: Option<PatternDescriptor>,
    #[serde(rename = "command list")]
    values: Box<[ColumnValue]>,
    #[serde(rename = "cl str")]
    cl_str: Box<[String]>,
    dtype: DType,
}

impl ColumnResult {
    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pattern that produced the column; `None` for the remainder.
    pub fn pattern(&self) -> Option<&PatternDescriptor> {
        self.pattern.as_ref()
    }

    /// Per-row values, in command list order.
    pub fn values(&self) -> &[ColumnValue] {
        &self.values
    }

    /// Per-row matched substrings (the leftover text for the remainder).
    pub fn cl_str(&self) -> &[String] {
        &self.cl_str
    }

    /// Element type of the values.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of values, one per command.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True for the column of leftover text.
    pub fn is_remainder(&self) -> bool {
        self.pattern.is_none() && self.name == REMAINDER
    }

    /// Values as floats, if the column is numeric.
    pub fn floats(&self) -> Option<Vec<f64>> {
        self.values.iter().map(ColumnValue::as_f64).collect()
    }

    /// Values as strings, if the column is textual.
    pub fn strings(&self) -> Option<Vec<&str>> {
        self.values.iter().map(ColumnValue::as_str).collect()
    }
}

/// Column under construction.
struct WorkingColumn {
    name: String,
    pattern: Option<PatternDescriptor>,
    values: Vec<Option<ColumnValue>>,
    matched: Vec<Option<String>>,
}

impl WorkingColumn {
    fn named(pattern: PatternDescriptor) -> Self {
        Self {
            name: pattern.name().to_string(),
            pattern: Some(pattern),
            values: Vec::new(),
            matched: Vec::new(),
        }
    }

    fn remainder(rows: Vec<Option<String>>) -> Self {
        Self {
            name: REMAINDER.to_string(),
            pattern: None,
            values: rows
                .iter()
                .map(|row| row.clone().map(ColumnValue::Str))
                .collect(),
            matched: rows,
        }
    }

    fn has_nulls(&self) -> bool {
        self.values.iter().any(Option::is_none)
    }

    fn is_homogeneous(&self) -> bool {
        let mut values = self.values.iter().flatten();
        match values.next() {
            Some(first) => values.all(|v| v.same_type(first)),
            None => true,
        }
    }

    /// Freeze the column, or explain why it was discarded.
    fn finish(self, diagnostics: &mut Diagnostics) -> Option<ColumnResult> {
        if self.values.is_empty() || self.has_nulls() {
            diagnostics.push(
                DiagnosticKind::DroppedColumn,
                &self.name,
                format!(
                    "Named group ({}) removed since some or all of the 'command list' has null values",
                    self.name
                ),
            );
            return None;
        }
        if !self.is_homogeneous() {
            diagnostics.push(
                DiagnosticKind::DroppedColumn,
                &self.name,
                format!(
                    "Named group ({}) removed since all entries in 'command list' do not have the same type",
                    self.name
                ),
            );
            return None;
        }

        let values: Vec<ColumnValue> = self.values.into_iter().flatten().collect();
        let dtype = match values.first() {
            Some(ColumnValue::Float(_)) => DType::Float64,
            _ => DType::string_for(values.iter().filter_map(ColumnValue::as_str)),
        };
        let cl_str: Vec<String> = self
            .matched
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();

        Some(ColumnResult {
            name: self.name,
            pattern: self.pattern,
            values: values.into_boxed_slice(),
            cl_str: cl_str.into_boxed_slice(),
            dtype,
        })
    }
}

// =============================================================================
// Parse outcome
// =============================================================================

/// Result of applying patterns to a command list.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    success: bool,
    columns: Vec<ColumnResult>,
    diagnostics: Diagnostics,
}

impl ParseOutcome {
    /// True if at least one named column was extracted.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Surviving columns: named columns in declaration order, then the
    /// remainder (if any). Always empty when the parse failed.
    pub fn columns(&self) -> &[ColumnResult] {
        &self.columns
    }

    /// Consume the outcome into its columns.
    pub fn into_columns(self) -> Vec<ColumnResult> {
        self.columns
    }

    /// Column `name`.
    pub fn get(&self, name: &str) -> Option<&ColumnResult> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// True if an entry with that name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Column names in result order.
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// True if no column was produced.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The leftover text column, if kept.
    pub fn remainder(&self) -> Option<&ColumnResult> {
        self.columns.iter().find(|c| c.is_remainder())
    }

    /// Columns discarded while parsing.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Split into success flag, columns and diagnostics.
    pub fn into_parts(self) -> (bool, Vec<ColumnResult>, Diagnostics) {
        (self.success, self.columns, self.diagnostics)
    }
}

// =============================================================================
// Parser
// =============================================================================

/// Applies regular expressions to a command list.
///
/// # Example
///
/// ```
/// use daq_control_map::parser::CommandListParser;
///
/// let parser = CommandListParser::new(["FREQ 50.0", "FREQ 60.0", "FREQ 70.0"]);
/// let outcome = parser
///     .apply(r"(?P<FREQ>(\bFREQ\s)(?P<VALUE>(\d+\.\d*|\.\d+|\d+\b)))")
///     .unwrap();
///
/// assert!(outcome.success());
/// let freq = outcome.get("FREQ").unwrap();
/// assert_eq!(freq.floats().unwrap(), vec![50.0, 60.0, 70.0]);
/// assert!(outcome.remainder().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandListParser {
    commands: CommandList,
}

impl CommandListParser {
    /// Parser over `commands`.
    pub fn new(commands: impl Into<CommandList>) -> Self {
        Self {
            commands: commands.into(),
        }
    }

    /// The command list being parsed.
    pub fn command_list(&self) -> &CommandList {
        &self.commands
    }

    /// Validate `patterns` and parse the command list with them.
    ///
    /// Pattern validation happens entirely before parsing, so an error never
    /// leaves partial results behind.
    pub fn apply(&self, patterns: impl Into<PatternSet>) -> Result<ParseOutcome, PatternError> {
        let compiled = patterns.into().compile()?;
        Ok(self.apply_compiled(compiled, Diagnostics::new()))
    }

    /// Parse with already validated patterns, recording discarded columns
    /// into `diagnostics`.
    pub fn apply_compiled(
        &self,
        patterns: Vec<PatternDescriptor>,
        mut diagnostics: Diagnostics,
    ) -> ParseOutcome {
        let mut named: Vec<WorkingColumn> = patterns.into_iter().map(WorkingColumn::named).collect();

        // working remainder; `None` once some row has been consumed entirely
        let mut remainder: Option<Vec<Option<String>>> =
            if self.commands.iter().any(String::is_empty) {
                None
            } else {
                Some(self.commands.iter().cloned().map(Some).collect())
            };

        for column in named.iter_mut() {
            let Some(rows) = remainder.as_ref() else {
                break;
            };

            let mut candidate = Vec::with_capacity(rows.len());
            for row in rows {
                let text = row.as_deref().unwrap_or_default();
                match column.pattern.as_ref().and_then(|p| p.extract(text)) {
                    Some((value, matched)) => {
                        let stripped = text.replace(matched, "");
                        let stripped = stripped.trim();
                        column.values.push(value);
                        column.matched.push(Some(matched.to_string()));
                        candidate.push((!stripped.is_empty()).then(|| stripped.to_string()));
                    }
                    None => {
                        column.values.push(None);
                        column.matched.push(None);
                        candidate.push(row.clone());
                    }
                }
            }

            if !column.has_nulls() && column.is_homogeneous() {
                if candidate.iter().any(Option::is_none) {
                    remainder = None;
                } else {
                    remainder = Some(candidate);
                }
            }
        }

        let mut columns: Vec<ColumnResult> = named
            .into_iter()
            .filter_map(|column| column.finish(&mut diagnostics))
            .collect();
        if let Some(rows) = remainder {
            if let Some(column) = WorkingColumn::remainder(rows).finish(&mut diagnostics) {
                columns.push(column);
            }
        }

        let success = match columns.as_slice() {
            [] => false,
            [only] => !only.is_remainder(),
            _ => true,
        };
        if !success {
            columns.clear();
        }

        tracing::debug!(
            success,
            rows = self.commands.len(),
            columns = columns.len(),
            "applied command list patterns"
        );

        ParseOutcome {
            success,
            columns,
            diagnostics,
        }
    }

    /// Render the outcome of [`apply`](Self::apply) as a text table, one row
    /// per command, for interactively trying out patterns.
    pub fn try_patterns(&self, patterns: impl Into<PatternSet>) -> Result<String, PatternError> {
        let outcome = self.apply(patterns)?;
        let width = self
            .commands
            .iter()
            .map(|c| c.chars().count())
            .max()
            .unwrap_or(0)
            .max(7)
            + 2;

        let mut header = format!("{:<9}{:<width$}", "command", "command");
        let mut types = format!("{:<9}{:<width$}", "index", "str");
        let col_width: Vec<usize> = outcome
            .columns()
            .iter()
            .map(|c| {
                c.values()
                    .iter()
                    .map(|v| v.to_string().chars().count())
                    .chain(std::iter::once(c.name().chars().count()))
                    .max()
                    .unwrap_or(0)
                    + 2
            })
            .collect();
        for (column, w) in outcome.columns().iter().zip(col_width.iter().copied()) {
            let _ = write!(header, "{:<w$}", column.name());
            let type_name = column.values().first().map_or("", ColumnValue::type_name);
            let _ = write!(types, "{:<w$}", type_name);
        }

        let mut table = String::new();
        let _ = writeln!(table, "{}", header.trim_end());
        let _ = writeln!(table, "{}", types.trim_end());
        for (index, command) in self.commands.iter().enumerate() {
            let mut line = format!("{:<9}{:<width$}", index, command);
            for (column, w) in outcome.columns().iter().zip(col_width.iter().copied()) {
                if let Some(value) = column.values().get(index) {
                    let _ = write!(line, "{:<w$}", value.to_string());
                }
            }
            let _ = writeln!(table, "{}", line.trim_end());
        }
        Ok(table)
    }
}
