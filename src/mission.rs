//! Daily login reward.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::extract::{self, Balance, MISSION_REDEEMED_MARKER, MISSION_SUCCESS_MARKER};
use crate::session::{classify, Page, Session};

const MISSION_PATH: &str = "/mission/daily";
const REDEEM_PATH: &str = "/mission/daily/redeem";

/// Outcome of a daily mission visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionResult {
    pub consecutive_days: u32,
    pub balance: Balance,
}

/// Redeems today's login reward, or reports it if it was already taken.
///
/// Safe to call repeatedly within a day. `Ok(None)` means the site refused the
/// redemption without signalling an error, which some account states do.
pub async fn redeem_daily_mission(session: &mut Session) -> Result<Option<MissionResult>> {
    tracing::info!("Requesting daily mission page");
    let mut page = session.get(MISSION_PATH, &[]).await?;
    classify(&page)?;

    if !page.contains(MISSION_REDEEMED_MARKER) {
        let once = extract::once_token(&page.body)
            .ok_or_else(|| Error::markup("mission page has no once token"))?;

        tracing::info!("Redeeming daily mission");
        page = session.get(REDEEM_PATH, &[("once", once.as_str())]).await?;
        classify(&page)?;

        if !page.contains(MISSION_SUCCESS_MARKER) {
            tracing::error!(path = %page.path, "Redeem was not confirmed by the site");
            return Ok(None);
        }
    } else {
        tracing::debug!("Daily mission already redeemed");
    }

    let result = mission_result(&page)?;
    tracing::info!(
        days = result.consecutive_days,
        balance = %result.balance,
        "Daily mission status"
    );
    Ok(Some(result))
}

fn mission_result(page: &Page) -> Result<MissionResult> {
    let consecutive_days = extract::consecutive_days(&page.body)
        .ok_or_else(|| Error::markup("mission page has no consecutive-day count"))?;
    let balance = extract::balance(&page.body)
        .ok_or_else(|| Error::markup("mission page has no balance"))?;
    Ok(MissionResult {
        consecutive_days,
        balance,
    })
}
