use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::Catalog;
use crate::FeedbackIdentity;
use crate::Host;
use crate::StatusLevel;

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Status(StatusLevel, String),
    CheckFeedbacks(Option<FeedbackIdentity>),
    RefreshIntegrations(Catalog),
}

#[derive(Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    notify: Notify,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn count<P>(
        &self,
        predicate: P,
    ) -> usize
    where
        P: Fn(&HostCall) -> bool,
    {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    /// Waits until at least `n` recorded calls match
    pub async fn wait_for_count<P>(
        &self,
        n: usize,
        predicate: P,
    ) where
        P: Fn(&HostCall) -> bool,
    {
        loop {
            let notified = self.notify.notified();
            if self.count(&predicate) >= n {
                return;
            }
            notified.await;
        }
    }

    pub async fn wait_for<P>(
        &self,
        predicate: P,
    ) where
        P: Fn(&HostCall) -> bool,
    {
        self.wait_for_count(1, predicate).await
    }

    fn record(
        &self,
        call: HostCall,
    ) {
        self.calls.lock().push(call);
        self.notify.notify_waiters();
    }
}

impl Host for RecordingHost {
    fn status(
        &self,
        level: StatusLevel,
        message: &str,
    ) {
        self.record(HostCall::Status(level, message.to_string()));
    }

    fn check_feedbacks(
        &self,
        identity: Option<&FeedbackIdentity>,
    ) {
        self.record(HostCall::CheckFeedbacks(identity.cloned()));
    }

    fn refresh_integrations(
        &self,
        catalog: &Catalog,
    ) {
        self.record(HostCall::RefreshIntegrations(catalog.clone()));
    }
}

pub fn is_status(
    level: StatusLevel,
    message: &'static str,
) -> impl Fn(&HostCall) -> bool {
    move |call| matches!(call, HostCall::Status(l, m) if *l == level && m == message)
}

pub fn is_check_all(call: &HostCall) -> bool {
    matches!(call, HostCall::CheckFeedbacks(None))
}

pub fn is_refresh(call: &HostCall) -> bool {
    matches!(call, HostCall::RefreshIntegrations(_))
}
