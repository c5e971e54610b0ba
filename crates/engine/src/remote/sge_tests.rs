// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn submission_output_yields_queue_id() {
    let adapter = SgeAdapter;
    assert_eq!(
        adapter.parse_queue_id("your job 1235 ('someFile') has been submitted"),
        Some(1235)
    );
    assert_eq!(
        adapter.parse_queue_id("Your job 231 (\"job.sge\") has been submitted"),
        Some(231)
    );
}

#[test]
fn submission_output_without_id_is_rejected() {
    let adapter = SgeAdapter;
    assert_eq!(adapter.parse_queue_id("Unable to run job"), None);
    assert_eq!(adapter.parse_queue_id("your job"), None);
}

#[test]
fn fixture_queue_line_parses_as_running() {
    let adapter = SgeAdapter;
    let parsed = adapter.parse_queue_line("231 0 hydra craig r 07/13/96 durin.q MASTER");
    assert_eq!(parsed, Some((231, JobState::RunningRemote)));
}

#[parameterized(
    running = { "r", JobState::RunningRemote },
    deleting = { "d", JobState::RunningRemote },
    errored = { "e", JobState::RunningRemote },
    queued_waiting = { "qw", JobState::RemoteQueued },
    queued = { "q", JobState::RemoteQueued },
    waiting = { "w", JobState::RemoteQueued },
    suspended = { "s", JobState::RemoteQueued },
    held = { "h", JobState::RemoteQueued },
    transferring = { "t", JobState::RemoteQueued },
)]
fn state_tokens_map_to_job_states(token: &str, expected: JobState) {
    let adapter = SgeAdapter;
    let line = format!("236 5 word elaine {} 07/13/96 durin.q", token);
    assert_eq!(adapter.parse_queue_line(&line), Some((236, expected)));
}

#[test]
fn unrecognized_state_token_skips_the_row() {
    let adapter = SgeAdapter;
    assert_eq!(
        adapter.parse_queue_line("236 5 word elaine z 07/13/96"),
        None
    );
}

#[test]
fn header_rows_are_skipped() {
    let adapter = SgeAdapter;
    assert_eq!(
        adapter.parse_queue_line("job-ID   prior   name         user      state   submit/start at"),
        None
    );
    assert_eq!(adapter.parse_queue_line(""), None);
}

#[test]
fn request_command_polls_by_user() {
    let adapter = SgeAdapter;
    let command = adapter.queue_request_command("qstat", "user01", &[QueueId::new(231)]);
    assert_eq!(command, "qstat -u user01");
}

#[test]
fn only_zero_exit_is_allowed() {
    let adapter = SgeAdapter;
    assert!(adapter.allowed_request_exit_codes().is_empty());
}

#[test]
fn default_template_expands_program_execution() {
    let adapter = SgeAdapter;
    assert!(adapter
        .default_launch_template()
        .contains("$$programExecution$$"));
    assert_eq!(adapter.default_launch_script_name(), "job.sge");
}
