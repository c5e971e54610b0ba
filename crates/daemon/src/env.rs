// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-variable overrides for the daemon.

use std::path::PathBuf;

/// Override for the broker state directory.
pub fn state_dir() -> Option<PathBuf> {
    std::env::var_os("MQ_STATE_DIR").map(PathBuf::from)
}

/// Override for the socket path itself (takes precedence over the
/// state-dir derived default).
pub fn socket_path() -> Option<PathBuf> {
    std::env::var_os("MQ_SOCKET").map(PathBuf::from)
}

/// Test mode switches the endpoint name to `MoleQueue-testing` so a
/// test broker never collides with a user's broker.
pub fn test_mode() -> bool {
    std::env::var("MQ_TEST_MODE").map(|v| v == "1").unwrap_or(false)
}
