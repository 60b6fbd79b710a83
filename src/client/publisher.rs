//! Outbound channel publishing port

use crate::error::Result;
use crate::protocol::{Channel, OverlayCommand};

/// Anything that can put a command on a channel
///
/// Fire-and-forget: implementations never queue while disconnected.
pub trait ChannelPublisher: Send + Sync {
    /// Publish a command on a channel
    fn publish(&self, channel: &Channel, command: &OverlayCommand) -> Result<()>;
}

impl<P: ChannelPublisher + ?Sized> ChannelPublisher for std::sync::Arc<P> {
    fn publish(&self, channel: &Channel, command: &OverlayCommand) -> Result<()> {
        (**self).publish(channel, command)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::*;
    use crate::error::TransportError;

    /// Publisher that records every command
    #[derive(Default)]
    pub(crate) struct RecordingPublisher {
        sent: Mutex<Vec<(Channel, OverlayCommand)>>,
        offline: std::sync::atomic::AtomicBool,
    }

    impl RecordingPublisher {
        pub(crate) fn sent(&self) -> Vec<(Channel, OverlayCommand)> {
            self.sent.lock().clone()
        }

        pub(crate) fn commands(&self) -> Vec<OverlayCommand> {
            self.sent.lock().iter().map(|(_, cmd)| cmd.clone()).collect()
        }

        pub(crate) fn set_offline(&self, offline: bool) {
            self.offline
                .store(offline, std::sync::atomic::Ordering::Relaxed);
        }
    }

    impl ChannelPublisher for RecordingPublisher {
        fn publish(&self, channel: &Channel, command: &OverlayCommand) -> Result<()> {
            if self.offline.load(std::sync::atomic::Ordering::Relaxed) {
                return Err(TransportError::NotConnected.into());
            }
            self.sent.lock().push((channel.clone(), command.clone()));
            Ok(())
        }
    }
}
