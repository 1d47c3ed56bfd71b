//! Per-sender rate limiting over a small JSON state file.
//!
//! State lives outside the process (one invocation per mesh message), so the
//! whole read-modify-write runs under an exclusive advisory file lock: two
//! concurrent invocations from the same sender cannot both be allowed.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

/// Outcome of a rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Throttled,
}

/// sender_id -> last-dispatch unix timestamp (seconds).
#[derive(Debug, Default, Serialize, Deserialize)]
struct RateState {
    #[serde(default)]
    senders: HashMap<String, i64>,
}

/// File-backed limiter. Construct once per invocation; the interval comes
/// from config.
pub struct RateLimiter {
    path: PathBuf,
    interval_seconds: u64,
}

impl RateLimiter {
    pub fn new(path: PathBuf, interval_seconds: u64) -> Self {
        Self {
            path,
            interval_seconds,
        }
    }

    /// Check the sender against the interval and, when allowed, record `now`
    /// as its new last-dispatch time. Throttled checks mutate nothing.
    /// Unknown senders are always allowed.
    pub fn check_and_record(&self, sender_id: &str, now: DateTime<Utc>) -> Result<RateDecision> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating state dir {}", parent.display()))?;
            }
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .with_context(|| format!("opening rate state {}", self.path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("locking rate state {}", self.path.display()))?;
        // Lock released when `file` drops, including on the error paths.
        let decision = self.locked_check(&mut file, sender_id, now);
        let _ = fs2::FileExt::unlock(&file);
        decision
    }

    fn locked_check(
        &self,
        file: &mut std::fs::File,
        sender_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RateDecision> {
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .with_context(|| format!("reading rate state {}", self.path.display()))?;
        let mut state: RateState = if contents.trim().is_empty() {
            RateState::default()
        } else {
            serde_json::from_str(&contents).unwrap_or_else(|e| {
                log::warn!("rate state unreadable, starting fresh: {}", e);
                RateState::default()
            })
        };

        let now_ts = now.timestamp();
        if let Some(&last) = state.senders.get(sender_id) {
            let elapsed = now_ts.saturating_sub(last);
            if elapsed >= 0 && (elapsed as u64) < self.interval_seconds {
                return Ok(RateDecision::Throttled);
            }
        }

        state.senders.insert(sender_id.to_string(), now_ts);
        let serialized = serde_json::to_string(&state).context("serializing rate state")?;
        file.seek(SeekFrom::Start(0))
            .context("rewinding rate state")?;
        file.set_len(0).context("truncating rate state")?;
        file.write_all(serialized.as_bytes())
            .with_context(|| format!("writing rate state {}", self.path.display()))?;
        Ok(RateDecision::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_state_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("meshclaw-limiter-test-{}", uuid::Uuid::new_v4()))
            .join("rate_state.json")
    }

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).single().expect("timestamp")
    }

    #[test]
    fn first_contact_is_allowed() {
        let limiter = RateLimiter::new(temp_state_path(), 60);
        let d = limiter.check_and_record("!node1", at(1_000)).expect("check");
        assert_eq!(d, RateDecision::Allowed);
    }

    #[test]
    fn throttles_inside_interval_then_allows_after() {
        let limiter = RateLimiter::new(temp_state_path(), 60);
        assert_eq!(
            limiter.check_and_record("!node1", at(1_000)).expect("check"),
            RateDecision::Allowed
        );
        assert_eq!(
            limiter.check_and_record("!node1", at(1_030)).expect("check"),
            RateDecision::Throttled
        );
        assert_eq!(
            limiter.check_and_record("!node1", at(1_061)).expect("check"),
            RateDecision::Allowed
        );
    }

    #[test]
    fn throttled_check_does_not_reset_the_window() {
        let limiter = RateLimiter::new(temp_state_path(), 60);
        limiter.check_and_record("!node1", at(1_000)).expect("check");
        limiter.check_and_record("!node1", at(1_059)).expect("check");
        // Had the throttled check recorded 1_059, this would still throttle.
        assert_eq!(
            limiter.check_and_record("!node1", at(1_061)).expect("check"),
            RateDecision::Allowed
        );
    }

    #[test]
    fn senders_are_independent() {
        let limiter = RateLimiter::new(temp_state_path(), 60);
        limiter.check_and_record("!node1", at(1_000)).expect("check");
        assert_eq!(
            limiter.check_and_record("!node2", at(1_001)).expect("check"),
            RateDecision::Allowed
        );
    }

    #[test]
    fn state_survives_across_limiter_instances() {
        let path = temp_state_path();
        RateLimiter::new(path.clone(), 60)
            .check_and_record("!node1", at(1_000))
            .expect("check");
        let d = RateLimiter::new(path, 60)
            .check_and_record("!node1", at(1_030))
            .expect("check");
        assert_eq!(d, RateDecision::Throttled);
    }

    #[test]
    fn corrupt_state_file_starts_fresh() {
        let path = temp_state_path();
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, b"not json").expect("write");
        let d = RateLimiter::new(path, 60)
            .check_and_record("!node1", at(1_000))
            .expect("check");
        assert_eq!(d, RateDecision::Allowed);
    }
}
