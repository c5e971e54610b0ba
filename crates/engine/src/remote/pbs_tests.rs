// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn submission_output_yields_queue_id() {
    let adapter = PbsAdapter;
    assert_eq!(adapter.parse_queue_id("1234.not.a.real.host"), Some(1234));
    assert_eq!(adapter.parse_queue_id("231.host\n"), Some(231));
}

#[test]
fn submission_output_without_id_is_rejected() {
    let adapter = PbsAdapter;
    assert_eq!(adapter.parse_queue_id("qsub: error"), None);
    assert_eq!(adapter.parse_queue_id(""), None);
}

#[test]
fn fixture_queue_line_parses_as_running() {
    let adapter = PbsAdapter;
    let parsed = adapter.parse_queue_line("231.host  scatter  user01  12:56:34 R batch");
    assert_eq!(parsed, Some((231, JobState::RunningRemote)));
}

#[parameterized(
    running = { "r", JobState::RunningRemote },
    exiting = { "e", JobState::RunningRemote },
    completed = { "c", JobState::RunningRemote },
    queued = { "q", JobState::RemoteQueued },
    held = { "h", JobState::RemoteQueued },
    transferring = { "t", JobState::RemoteQueued },
    waiting = { "w", JobState::RemoteQueued },
    suspended = { "s", JobState::RemoteQueued },
)]
fn state_tokens_map_to_job_states(token: &str, expected: JobState) {
    let adapter = PbsAdapter;
    let line = format!("231.host  scatter  user01  12:56:34 {} batch", token);
    assert_eq!(adapter.parse_queue_line(&line), Some((231, expected)));

    // Uppercase tokens behave the same.
    let line = format!(
        "231.host  scatter  user01  12:56:34 {} batch",
        token.to_uppercase()
    );
    assert_eq!(adapter.parse_queue_line(&line), Some((231, expected)));
}

#[test]
fn unrecognized_state_token_skips_the_row() {
    let adapter = PbsAdapter;
    assert_eq!(
        adapter.parse_queue_line("231.host  scatter  user01  12:56:34 X batch"),
        None
    );
}

#[test]
fn header_rows_are_skipped() {
    let adapter = PbsAdapter;
    assert_eq!(
        adapter.parse_queue_line("Job id           Name             User             Time Use S Queue"),
        None
    );
    assert_eq!(
        adapter.parse_queue_line("---------------- ---------------- ----------------"),
        None
    );
    assert_eq!(adapter.parse_queue_line(""), None);
}

#[test]
fn request_command_lists_tracked_ids() {
    let adapter = PbsAdapter;
    let command = adapter.queue_request_command(
        "qstat",
        "user01",
        &[QueueId::new(231), QueueId::new(232)],
    );
    assert_eq!(command, "qstat 231 232");
}

#[test]
fn completed_and_ezhpc_exit_codes_are_allowed() {
    let adapter = PbsAdapter;
    assert_eq!(adapter.allowed_request_exit_codes(), &[153, 35]);
}

#[test]
fn default_template_expands_program_execution() {
    let adapter = PbsAdapter;
    assert!(adapter
        .default_launch_template()
        .contains("$$programExecution$$"));
    assert_eq!(adapter.default_launch_script_name(), "job.pbs");
}
