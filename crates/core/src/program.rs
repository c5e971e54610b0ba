// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Launch templates for queue programs.
//!
//! A `Program` describes how one executable is invoked on a queue. The
//! rendered invocation replaces `$$programExecution$$` inside the queue's
//! launch template, after which every `$$keyword$$` placeholder is
//! substituted from the job's keyword map plus the queue-provided minimum
//! set.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::job::JobData;

/// How a program's invocation line is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LaunchSyntax {
    /// `<exec> <args>`
    Plain,
    /// `<exec> <args> $$inputFileName$$`
    InputArg,
    /// `<exec> <args> $$inputFileBaseName$$`
    InputArgNoExt,
    /// `<exec> <args> < $$inputFileName$$ > <outputFilename>`
    Redirect,
    /// `<exec> <args> $$inputFileName$$ > <outputFilename>`
    InputArgOutputRedirect,
    /// The queue's launch template is the driver script, with no
    /// `$$programExecution$$` substitution.
    Custom,
}

impl Default for LaunchSyntax {
    fn default() -> Self {
        LaunchSyntax::Redirect
    }
}

/// Per-queue launch description for one executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Program {
    pub name: String,
    pub executable: String,
    /// Absolute directory prefixed to the executable when set.
    pub executable_path: Option<String>,
    /// Raw argument string appended after the executable.
    pub arguments: String,
    /// Leaf name the job's input is staged under when the job does not
    /// name one itself.
    pub input_filename: String,
    /// Output filename template; may reference `$$inputFileBaseName$$`.
    pub output_filename: String,
    pub launch_syntax: LaunchSyntax,
}

impl Default for Program {
    fn default() -> Self {
        Self {
            name: String::new(),
            executable: String::new(),
            executable_path: None,
            arguments: String::new(),
            input_filename: "job.inp".to_string(),
            output_filename: "$$inputFileBaseName$$.out".to_string(),
            launch_syntax: LaunchSyntax::Redirect,
        }
    }
}

impl Program {
    pub fn new(name: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executable: executable.into(),
            ..Self::default()
        }
    }

    /// The executable with its optional path prefix.
    pub fn executable_invocation(&self) -> String {
        match &self.executable_path {
            Some(path) if !path.is_empty() => format!("{}/{}", path, self.executable),
            _ => self.executable.clone(),
        }
    }

    /// Leaf name the job's primary input is staged under.
    pub fn effective_input_filename(&self, job: &JobData) -> String {
        job.input_file
            .filename()
            .unwrap_or_else(|| self.input_filename.clone())
    }

    /// The invocation line for this program, still containing
    /// `$$keyword$$` placeholders. Empty for `Custom` syntax, which is
    /// rendered from the queue template instead.
    pub fn render_execution(&self) -> String {
        let mut invocation = self.executable_invocation();
        if !self.arguments.is_empty() {
            invocation.push(' ');
            invocation.push_str(&self.arguments);
        }

        match self.launch_syntax {
            LaunchSyntax::Plain => invocation,
            LaunchSyntax::InputArg => format!("{invocation} $$inputFileName$$"),
            LaunchSyntax::InputArgNoExt => format!("{invocation} $$inputFileBaseName$$"),
            LaunchSyntax::Redirect => format!(
                "{invocation} < $$inputFileName$$ > {}",
                self.output_filename
            ),
            LaunchSyntax::InputArgOutputRedirect => format!(
                "{invocation} $$inputFileName$$ > {}",
                self.output_filename
            ),
            LaunchSyntax::Custom => String::new(),
        }
    }
}

/// Replace every `$$key$$` placeholder with its keyword value.
pub fn expand_keywords(template: &str, keywords: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in keywords {
        result = result.replace(&format!("$${key}$$"), value);
    }
    result
}

/// Render the full launch script for a job.
///
/// `$$programExecution$$` is substituted first (skipped under `Custom`
/// syntax, where the queue template stands on its own), then the job's
/// keywords, then the queue-provided keyword set.
pub fn render_launch_script(
    queue_template: &str,
    program: &Program,
    job: &JobData,
    queue_keywords: &HashMap<String, String>,
) -> String {
    let template = if program.launch_syntax == LaunchSyntax::Custom {
        queue_template.to_string()
    } else {
        queue_template.replace("$$programExecution$$", &program.render_execution())
    };

    let expanded = expand_keywords(&template, &job.keywords);
    expand_keywords(&expanded, queue_keywords)
}

#[cfg(test)]
#[path = "program_tests.rs"]
mod tests;
