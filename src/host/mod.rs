//! Outward collaborator: the control-surface host.

use std::fmt;

use tracing::info;
use tracing::warn;

use crate::Catalog;
use crate::FeedbackIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Ok,
    Warning,
}

impl fmt::Display for StatusLevel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            StatusLevel::Ok => write!(f, "ok"),
            StatusLevel::Warning => write!(f, "warning"),
        }
    }
}

/// Callbacks into the host. Called from the bridge event loop; must not block.
pub trait Host: Send + Sync + 'static {
    fn status(
        &self,
        level: StatusLevel,
        message: &str,
    );

    /// Re-poll one feedback, or every feedback when `None`
    fn check_feedbacks(
        &self,
        identity: Option<&FeedbackIdentity>,
    );

    /// Rebuild the action/preset/feedback catalog from raw definitions
    fn refresh_integrations(
        &self,
        catalog: &Catalog,
    );
}

/// Host used by the standalone binary: reports everything to the log
#[derive(Debug, Default)]
pub struct LoggingHost;

impl Host for LoggingHost {
    fn status(
        &self,
        level: StatusLevel,
        message: &str,
    ) {
        match level {
            StatusLevel::Ok => info!(%level, "status: {}", message),
            StatusLevel::Warning => warn!(%level, "status: {}", message),
        }
    }

    fn check_feedbacks(
        &self,
        identity: Option<&FeedbackIdentity>,
    ) {
        match identity {
            Some(identity) => info!(%identity, "check feedback"),
            None => info!("check all feedbacks"),
        }
    }

    fn refresh_integrations(
        &self,
        catalog: &Catalog,
    ) {
        info!(last_update = catalog.last_update, "definitions refreshed");
    }
}
