/// The current state of a host connect job.
/// Loosely follows net/base/load_states.h, narrowed to connection setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectState {
    /// The job has not started yet.
    #[default]
    Idle,

    /// Resolving the host into candidate addresses.
    ResolvingHost,

    /// Candidate attempts are racing.
    Connecting,

    /// Establishing an SSL connection over the winning socket.
    SslHandshake,

    /// A connection was established and handed to the caller.
    Connected,

    /// Every candidate failed.
    AllFailed,

    /// The caller's cancel signal fired before any candidate succeeded.
    Cancelled,
}

impl ConnectState {
    /// True once the job can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectState::Connected | ConnectState::AllFailed | ConnectState::Cancelled
        )
    }
}
