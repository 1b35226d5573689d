//! Process termination signal

/// Signal that asked the process to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// Ctrl-C / SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl TerminationSignal {
    /// Exit status a shell reports for a process killed by this signal
    pub fn exit_code(self) -> i32 {
        match self {
            TerminationSignal::Interrupt => 130,
            TerminationSignal::Terminate => 143,
        }
    }
}

/// Resolves once the process receives Ctrl-C or, on Unix, SIGTERM
///
/// Listening replaces the default handler for these signals, so whoever
/// awaits this is responsible for ending the process afterwards.
/// If no handler can be registered the future never resolves.
pub async fn termination_signal() -> TerminationSignal {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        match result {
                            Ok(()) => TerminationSignal::Interrupt,
                            Err(e) => {
                                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                                terminate.recv().await;
                                TerminationSignal::Terminate
                            }
                        }
                    }
                    _ = terminate.recv() => TerminationSignal::Terminate,
                }
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                ctrl_c_or_pending().await
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c_or_pending().await
}

async fn ctrl_c_or_pending() -> TerminationSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    TerminationSignal::Interrupt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_shell_convention() {
        assert_eq!(TerminationSignal::Interrupt.exit_code(), 130);
        assert_eq!(TerminationSignal::Terminate.exit_code(), 143);
    }
}
