//
//  git-providers
//  output/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Output Module
//!
//! Renders provider results for the `gp` binary either as tables for the
//! terminal or as pretty-printed JSON for scripts.
//!
//! - [`table`]: `comfy_table` builders and cell formatting
//! - [`json`]: `serde_json` writers
//!
//! Every canonical model type implements [`TableOutput`], so commands hand
//! their results to an [`OutputWriter`] and never format by hand.
//!
//! ```rust,no_run
//! use git_providers::context::GitBranch;
//! use git_providers::output::{OutputFormat, OutputWriter};
//!
//! let branches = vec![GitBranch { name: "main".into(), sha: "abc".into() }];
//! OutputWriter::new(OutputFormat::Json).write_list(&branches)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

mod json;
mod table;

pub use json::*;
pub use table::*;

use serde::Serialize;

use crate::context::{
    GitBranch, GitNamespace, GitPullRequest, GitRepository, GitUser, StaticGitContext,
};

/// Output formats selectable with `--json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Tables and key/value listings with optional colour.
    #[default]
    Table,
    /// Pretty-printed JSON.
    Json,
}

/// Writes values in the selected [`OutputFormat`].
///
/// Colour follows `console::colors_enabled()`, which honours `NO_COLOR` and
/// non-terminal stdout.
pub struct OutputWriter {
    format: OutputFormat,
    color: bool,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            color: console::colors_enabled(),
        }
    }

    /// Writes one value: a field listing or a JSON object.
    pub fn write<T: Serialize + TableOutput>(&self, value: &T) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => write_json(value)?,
            OutputFormat::Table => {
                for (key, field) in value.fields() {
                    print_field(key, &field, self.color);
                }
            }
        }
        Ok(())
    }

    /// Writes a list: one table row per value or a JSON array.
    pub fn write_list<T: Serialize + TableOutput>(&self, values: &[T]) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => write_json(&values)?,
            OutputFormat::Table if values.is_empty() => self.write_info("No results"),
            OutputFormat::Table => render_rows(values, self.color).print(),
        }
        Ok(())
    }

    pub fn write_warning(&self, msg: &str) {
        use console::style;
        if self.color {
            eprintln!("{} {}", style("warning:").yellow().bold(), msg);
        } else {
            eprintln!("warning: {}", msg);
        }
    }

    pub fn write_info(&self, msg: &str) {
        println!("{}", msg);
    }
}

/// Table rendering of a model type.
///
/// `fields` drives the single-value listing; `headers` and `row` drive list
/// tables. By default a row is the field values in order.
pub trait TableOutput {
    fn fields(&self) -> Vec<(&'static str, String)>;

    fn headers() -> Vec<&'static str>
    where
        Self: Sized;

    fn row(&self) -> Vec<String> {
        self.fields().into_iter().map(|(_, value)| value).collect()
    }
}

/// Builds the list table for `values`.
pub fn render_rows<T: TableOutput>(values: &[T], color: bool) -> TableBuilder {
    TableBuilder::new()
        .color(color)
        .headers(T::headers())
        .rows(values.iter().map(|v| v.row()))
}

/// Prints a `key: value` line, dimming the key when colour is on.
pub fn print_field(key: &str, value: &str, color: bool) {
    use console::style;
    if color {
        println!("{}: {}", style(key).dim(), value);
    } else {
        println!("{}: {}", key, value);
    }
}

fn or_dash(value: Option<&str>) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or("-").to_string()
}

impl TableOutput for StaticGitContext {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Id", self.id.clone()),
            ("Name", self.name.clone()),
            ("Owner", self.owner.clone()),
            ("Url", self.url.clone()),
            ("Source", self.source.clone()),
            ("Branch", or_dash(self.branch.as_deref())),
            ("Sha", or_dash(self.sha.as_deref())),
            ("Path", or_dash(self.path.as_deref())),
            ("PR", or_dash(self.pr_number.map(|n| n.to_string()).as_deref())),
        ]
    }

    fn headers() -> Vec<&'static str> {
        vec!["Id", "Name", "Owner", "Url", "Source", "Branch", "Sha", "Path", "PR"]
    }
}

impl TableOutput for GitRepository {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Id", self.id.clone()),
            ("Name", self.name.clone()),
            ("Owner", self.owner.clone()),
            ("Url", self.url.clone()),
            ("Branch", or_dash(Some(&self.branch))),
            ("Sha", or_dash(Some(&self.sha))),
            ("Path", or_dash(self.path.as_deref())),
            ("PR", or_dash(self.pr_number.map(|n| n.to_string()).as_deref())),
            ("Source", self.source.clone()),
        ]
    }

    fn headers() -> Vec<&'static str> {
        vec!["Id", "Name", "Owner", "Default branch", "Url"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            truncate(&self.id, 40),
            self.name.clone(),
            self.owner.clone(),
            or_dash(Some(&self.branch)),
            self.url.clone(),
        ]
    }
}

impl TableOutput for GitNamespace {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![("Id", self.id.clone()), ("Name", self.name.clone())]
    }

    fn headers() -> Vec<&'static str> {
        vec!["Id", "Name"]
    }
}

impl TableOutput for GitBranch {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![("Name", self.name.clone()), ("Sha", or_dash(Some(&self.sha)))]
    }

    fn headers() -> Vec<&'static str> {
        vec!["Name", "Sha"]
    }
}

impl TableOutput for GitPullRequest {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Title", self.name.clone()),
            ("Branch", self.branch.clone()),
            ("Sha", or_dash(Some(&self.sha))),
            ("Source repo", self.source_repo_url.clone()),
            ("Source owner", self.source_repo_owner.clone()),
        ]
    }

    fn headers() -> Vec<&'static str> {
        vec!["Title", "Branch", "Sha", "Source repo"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            truncate(&self.name, 60),
            self.branch.clone(),
            truncate(&self.sha, 12),
            self.source_repo_url.clone(),
        ]
    }
}

impl TableOutput for GitUser {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Id", self.id.clone()),
            ("Username", self.username.clone()),
            ("Name", or_dash(Some(&self.name))),
            ("Email", or_dash(Some(&self.email))),
        ]
    }

    fn headers() -> Vec<&'static str> {
        vec!["Id", "Username", "Name", "Email"]
    }
}
