// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ink_daemon::DaemonConfig;

pub async fn run() -> anyhow::Result<()> {
    ink_daemon::run(DaemonConfig::default()).await?;
    Ok(())
}
