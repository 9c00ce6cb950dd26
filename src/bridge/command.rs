use crate::Catalog;
use crate::ConnectResult;
use crate::ImageSet;
use crate::Resolution;
use crate::RpcError;

/// Requests from the handle to the event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// The miss queue went from empty to non-empty
    Wake,
    RefreshIntegrations,
}

/// Completed background work, tagged with the epoch it was started under
pub(crate) enum TaskOutcome {
    Connect {
        epoch: u64,
        result: ConnectResult,
    },
    Setup {
        epoch: u64,
        images: Result<ImageSet, RpcError>,
        handshake: Result<(), RpcError>,
    },
    Catalog {
        epoch: u64,
        result: Result<Catalog, RpcError>,
    },
    Rebuilt {
        epoch: u64,
        resolutions: Vec<Resolution>,
    },
}
