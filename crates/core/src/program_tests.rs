// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::filespec::FileSpecification;
use yare::parameterized;

fn program(syntax: LaunchSyntax) -> Program {
    let mut p = Program::new("psi4", "psi4");
    p.arguments = "-n 4".to_string();
    p.output_filename = "$$inputFileBaseName$$.out".to_string();
    p.launch_syntax = syntax;
    p
}

#[parameterized(
    plain = { LaunchSyntax::Plain, "psi4 -n 4" },
    input_arg = { LaunchSyntax::InputArg, "psi4 -n 4 $$inputFileName$$" },
    input_arg_no_ext = { LaunchSyntax::InputArgNoExt, "psi4 -n 4 $$inputFileBaseName$$" },
    redirect = {
        LaunchSyntax::Redirect,
        "psi4 -n 4 < $$inputFileName$$ > $$inputFileBaseName$$.out"
    },
    input_arg_output_redirect = {
        LaunchSyntax::InputArgOutputRedirect,
        "psi4 -n 4 $$inputFileName$$ > $$inputFileBaseName$$.out"
    },
)]
fn render_execution_forms(syntax: LaunchSyntax, expected: &str) {
    assert_eq!(program(syntax).render_execution(), expected);
}

#[test]
fn executable_path_prefixes_invocation() {
    let mut p = Program::new("orca", "orca");
    p.executable_path = Some("/opt/orca".to_string());
    p.launch_syntax = LaunchSyntax::Plain;

    assert_eq!(p.render_execution(), "/opt/orca/orca");
}

#[test]
fn arguments_omitted_when_empty() {
    let mut p = Program::new("sleep", "sleep");
    p.launch_syntax = LaunchSyntax::Plain;
    assert_eq!(p.render_execution(), "sleep");
}

#[test]
fn effective_input_filename_prefers_job_input() {
    let p = Program::new("psi4", "psi4");

    let mut job = JobData::new();
    job.input_file = FileSpecification::from_contents("water.inp", "");
    assert_eq!(p.effective_input_filename(&job), "water.inp");

    job.input_file = FileSpecification::Invalid;
    assert_eq!(p.effective_input_filename(&job), "job.inp");
}

#[test]
fn expand_keywords_replaces_all_occurrences() {
    let mut keywords = HashMap::new();
    keywords.insert("moleQueueId".to_string(), "7".to_string());

    let out = expand_keywords("dir/$$moleQueueId$$/run-$$moleQueueId$$", &keywords);
    assert_eq!(out, "dir/7/run-7");
}

#[test]
fn launch_script_substitutes_execution_then_keywords() {
    let p = program(LaunchSyntax::Redirect);
    let mut job = JobData::new();
    job.input_file = FileSpecification::from_contents("water.inp", "");
    job.keywords
        .insert("comment".to_string(), "scatter".to_string());

    let mut queue_keywords = HashMap::new();
    queue_keywords.insert("inputFileName".to_string(), "water.inp".to_string());
    queue_keywords.insert("inputFileBaseName".to_string(), "water".to_string());
    queue_keywords.insert("numberOfCores".to_string(), "4".to_string());

    let script = render_launch_script(
        "#!/bin/sh\n# $$comment$$ on $$numberOfCores$$ cores\n$$programExecution$$\n",
        &p,
        &job,
        &queue_keywords,
    );

    assert_eq!(
        script,
        "#!/bin/sh\n# scatter on 4 cores\npsi4 -n 4 < water.inp > water.out\n"
    );
}

#[test]
fn custom_syntax_uses_queue_template_verbatim() {
    let p = program(LaunchSyntax::Custom);
    let job = JobData::new();
    let queue_keywords = HashMap::new();

    let script = render_launch_script(
        "#!/bin/sh\nmy-driver --all\n",
        &p,
        &job,
        &queue_keywords,
    );

    assert_eq!(script, "#!/bin/sh\nmy-driver --all\n");
}

#[test]
fn job_keywords_expand_before_queue_keywords() {
    let p = program(LaunchSyntax::Plain);
    let mut job = JobData::new();
    job.keywords
        .insert("moleQueueId".to_string(), "overridden".to_string());

    let mut queue_keywords = HashMap::new();
    queue_keywords.insert("moleQueueId".to_string(), "7".to_string());

    let script = render_launch_script("id=$$moleQueueId$$", &p, &job, &queue_keywords);

    assert_eq!(script, "id=overridden");
}
