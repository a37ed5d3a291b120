use std::time::Duration;

use thiserror::Error;

use crate::lights::LightId;

/// Failures reported by a [`Bridge`](crate::bridge::Bridge) implementation
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bridge returned status {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("bridge rejected the request: {0}")]
    Api(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("light {0} is unknown to the bridge")]
    UnknownLight(LightId),

    #[error("no answer within {0:?}")]
    Timeout(Duration),
}

/// Errors that stop an effect before any light was touched
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("group '{target}' could not be resolved")]
    Discovery {
        target: String,
        #[source]
        source: Option<BridgeError>,
    },

    #[error("could not fetch light states for group '{group}'")]
    Fetch {
        group: String,
        #[source]
        source: BridgeError,
    },

    #[error("no reachable lights in group '{group}' ({total} members)")]
    NoReachableLights { group: String, total: usize },

    #[error("interrupted before the effect started on group '{group}'")]
    Interrupted { group: String },
}

/// Per-light failures. These are logged and collected, never fatal.
#[derive(Debug, Error)]
pub enum LightError {
    #[error("light {light}: {operation} failed: {source}")]
    Command {
        light: LightId,
        operation: &'static str,
        #[source]
        source: BridgeError,
    },

    #[error("light {light}: {operation} timed out after {after:?}")]
    Timeout {
        light: LightId,
        operation: &'static str,
        after: Duration,
    },

    #[error("light {light}: state still differs from the captured state after retry")]
    RestoreMismatch { light: LightId },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("{0} is not set (config.ron or environment)")]
    Missing(&'static str),
}
