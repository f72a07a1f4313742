use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use chrono::Duration;

use crate::join::SubmissionPick;
use crate::throttle::ThrottlePolicy;

/// Behaviour knobs of the portal itself; no connection details.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalSettings {
    pub sign_in: ThrottlePolicy,
    pub sign_up: ThrottlePolicy,
    pub submission_pick: SubmissionPick,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            sign_in: ThrottlePolicy::new(5, Duration::minutes(5)),
            sign_up: ThrottlePolicy::new(3, Duration::minutes(10)),
            submission_pick: SubmissionPick::MostRecent,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub portal: PortalSettings,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .context("DATABASE_URL must be set to a Postgres instance")?;
        let defaults = PortalSettings::default();

        let sign_in = ThrottlePolicy::new(
            parse_or(&lookup, "PORTAL_SIGNIN_MAX_ATTEMPTS", defaults.sign_in.max_attempts)?,
            parse_window(&lookup, "PORTAL_SIGNIN_WINDOW_SECS", defaults.sign_in.window)?,
        );
        let sign_up = ThrottlePolicy::new(
            parse_or(&lookup, "PORTAL_SIGNUP_MAX_ATTEMPTS", defaults.sign_up.max_attempts)?,
            parse_window(&lookup, "PORTAL_SIGNUP_WINDOW_SECS", defaults.sign_up.window)?,
        );

        Ok(Self {
            database_url,
            max_connections: parse_or(&lookup, "PORTAL_DB_MAX_CONNECTIONS", 5)?,
            portal: PortalSettings {
                sign_in,
                sign_up,
                submission_pick: parse_or(
                    &lookup,
                    "PORTAL_SUBMISSION_PICK",
                    defaults.submission_pick,
                )?,
            },
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|err| anyhow!("invalid {key}={raw:?}: {err}")),
    }
}

/// Throttle windows are whole seconds, strictly positive and small enough for `Duration`.
fn parse_window<F>(lookup: &F, key: &str, default: Duration) -> anyhow::Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    if lookup(key).is_none() {
        return Ok(default);
    }
    let secs: u64 = parse_or(lookup, key, 0)?;
    if secs == 0 {
        bail!("invalid {key}: the window must be at least one second");
    }
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .with_context(|| format!("invalid {key}: {secs} seconds is out of range"))
}
