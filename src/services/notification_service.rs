use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::state::{SharedState, board::TokenPassed};

const WEBHOOK_EVENT: &str = "bastao_giro";

/// Body posted to the automation webhook after a pass.
#[derive(Debug, Serialize)]
struct RotationWebhook<'a> {
    evento: &'static str,
    team_name: &'static str,
    com_bastao_agora: &'a str,
    proximos: &'a [String],
}

/// Record the pass in the daily tally and notify the automation webhook.
///
/// Runs detached; failures are logged and never reach the caller.
pub fn announce_token_passed(state: &SharedState, passed: TokenPassed) {
    let state = state.clone();
    let at = OffsetDateTime::now_utc();
    tokio::spawn(async move {
        record_tally(&state, &passed, at).await;
        notify_webhook(&state, &passed).await;
    });
}

async fn record_tally(state: &SharedState, passed: &TokenPassed, at: OffsetDateTime) {
    let Some(store) = state.snapshot_store().await else {
        debug!(holder = %passed.holder, "no store installed; token tally skipped");
        return;
    };
    if let Err(err) = store
        .record_token_assumed(passed.holder.clone(), passed.team, at)
        .await
    {
        warn!(holder = %passed.holder, team = %passed.team, error = %err, "failed to record token tally");
    }
}

async fn notify_webhook(state: &SharedState, passed: &TokenPassed) {
    let Some(url) = state.config().webhook_url() else {
        return;
    };

    let body = RotationWebhook {
        evento: WEBHOOK_EVENT,
        team_name: passed.team.display_name(),
        com_bastao_agora: &passed.holder,
        proximos: &passed.remaining,
    };

    match state.http().post(url).json(&body).send().await {
        Ok(response) if response.status().is_success() => {
            debug!(team = %passed.team, "rotation webhook delivered");
        }
        Ok(response) => {
            warn!(status = %response.status(), "rotation webhook rejected");
        }
        Err(err) => warn!(error = %err, "rotation webhook failed"),
    }
}
