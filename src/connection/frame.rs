//! Iframe lifecycle.
//!
//! A connection owns exactly one iframe. [`FrameSlot`] records its handle
//! and forwards mount/navigate/unmount to the [`Host`].

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::host::{FrameAttributes, Host};
use crate::identifiers::{ContainerId, FrameId};

// ============================================================================
// Constants
// ============================================================================

/// Features the embedded editor is allowed to use.
pub const FRAME_PERMISSIONS: [&str; 5] = [
    "fullscreen",
    "camera",
    "display-capture",
    "local-fonts",
    "microphone",
];

/// Sizing policy making the iframe fill a flex container.
pub const FRAME_STYLE: &str = "flex: 1; width: 100%; height: 100%; border: none;";

/// Returns the attributes every embed iframe is created with.
#[must_use]
pub fn frame_attributes() -> FrameAttributes {
    FrameAttributes {
        allow: FRAME_PERMISSIONS.join("; "),
        style: FRAME_STYLE.to_string(),
    }
}

// ============================================================================
// FrameSlot
// ============================================================================

/// Mount state of the connection's iframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Not mounted yet.
    Empty,
    /// Attached to its container.
    Mounted(FrameId),
    /// Detached; never re-mounted.
    Detached(FrameId),
}

impl Slot {
    /// Returns the handle of a frame that was ever mounted.
    fn id(self) -> Option<FrameId> {
        match self {
            Self::Mounted(id) | Self::Detached(id) => Some(id),
            Self::Empty => None,
        }
    }

    /// Marks an attached frame detached, returning its handle.
    fn detach(&mut self) -> Option<FrameId> {
        match *self {
            Self::Mounted(id) => {
                *self = Self::Detached(id);
                Some(id)
            }
            Self::Empty | Self::Detached(_) => None,
        }
    }
}

/// The single iframe owned by a connection.
///
/// Backed by a watch channel so the message bus can wait for the mount
/// reply when a frame message overtakes it.
pub(crate) struct FrameSlot {
    slot: watch::Sender<Slot>,
}

impl FrameSlot {
    /// Creates an empty slot.
    pub(crate) fn new() -> Self {
        let (slot, _) = watch::channel(Slot::Empty);
        Self { slot }
    }

    /// Returns the frame handle while attached.
    pub(crate) fn mounted(&self) -> Option<FrameId> {
        match *self.slot.borrow() {
            Slot::Mounted(id) => Some(id),
            Slot::Empty | Slot::Detached(_) => None,
        }
    }

    /// Returns the frame handle, attached or not.
    pub(crate) fn frame_id(&self) -> Option<FrameId> {
        self.slot.borrow().id()
    }

    /// Waits until the host has assigned a frame handle.
    ///
    /// Never resolves if the mount fails; callers race it against teardown.
    pub(crate) async fn assigned(&self) -> FrameId {
        let mut rx = self.slot.subscribe();
        loop {
            if let Some(id) = rx.borrow_and_update().id() {
                return id;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Creates the iframe and appends it to `container`.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if this slot already held a frame
    /// - Host errors from mounting
    pub(crate) async fn mount(
        &self,
        host: &dyn Host,
        container: &ContainerId,
        url: &str,
    ) -> Result<FrameId> {
        if *self.slot.borrow() != Slot::Empty {
            return Err(Error::protocol("connection already owns an iframe"));
        }

        let id = host.mount_frame(container, url, &frame_attributes()).await?;
        self.slot.send_replace(Slot::Mounted(id));

        debug!(frame_id = %id, %container, "Iframe mounted");
        Ok(id)
    }

    /// Reassigns the iframe's source.
    ///
    /// # Errors
    ///
    /// - [`Error::NoActiveConnection`] if the iframe is not attached
    /// - Host errors from navigation
    pub(crate) async fn navigate(&self, host: &dyn Host, url: &str) -> Result<()> {
        let id = self.mounted().ok_or(Error::NoActiveConnection)?;
        host.navigate_frame(id, url).await?;
        debug!(frame_id = %id, "Iframe navigated");
        Ok(())
    }

    /// Detaches the iframe. Safe to call any number of times.
    pub(crate) async fn unmount(&self, host: &dyn Host) {
        let Some(id) = self.take_mounted() else {
            return;
        };

        if let Err(e) = host.unmount_frame(id).await {
            warn!(frame_id = %id, error = %e, "Failed to detach iframe");
        } else {
            debug!(frame_id = %id, "Iframe detached");
        }
    }

    /// Marks the frame detached without talking to the host.
    ///
    /// Returns the handle if it was still attached.
    pub(crate) fn take_mounted(&self) -> Option<FrameId> {
        let mut taken = None;
        self.slot.send_if_modified(|slot| {
            taken = slot.detach();
            taken.is_some()
        });
        taken
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::host::MemoryHost;

    #[test]
    fn test_frame_attributes() {
        let attributes = frame_attributes();
        assert_eq!(
            attributes.allow,
            "fullscreen; camera; display-capture; local-fonts; microphone"
        );
        assert!(attributes.style.contains("flex: 1"));
    }

    #[tokio::test]
    async fn test_mount_navigate_unmount() {
        let host = MemoryHost::new();
        let container = host.add_container("root");
        let slot = FrameSlot::new();

        let id = slot
            .mount(&host, &container, "https://cantoo.fr/api/embed?a")
            .await
            .expect("mount");
        assert_eq!(slot.mounted(), Some(id));

        slot.navigate(&host, "https://cantoo.fr/api/embed?b")
            .await
            .expect("navigate");
        assert_eq!(
            host.frame(id).map(|f| f.src),
            Some("https://cantoo.fr/api/embed?b".to_string())
        );

        slot.unmount(&host).await;
        slot.unmount(&host).await;
        assert_eq!(slot.mounted(), None);
        assert_eq!(slot.frame_id(), Some(id));
        assert_eq!(host.attached_frame_count(), 0);
    }

    #[tokio::test]
    async fn test_single_frame_per_slot() {
        let host = MemoryHost::new();
        let container = host.add_container("root");
        let slot = FrameSlot::new();

        slot.mount(&host, &container, "https://cantoo.fr").await.expect("mount");
        let second = slot.mount(&host, &container, "https://cantoo.fr").await;
        assert!(matches!(second, Err(Error::Protocol { .. })));
        assert_eq!(host.attached_frame_count(), 1);
    }

    #[tokio::test]
    async fn test_assigned_waits_for_mount() {
        let host = MemoryHost::new();
        let container = host.add_container("root");
        let slot = FrameSlot::new();

        let (assigned, mounted) = tokio::join!(slot.assigned(), async {
            tokio::task::yield_now().await;
            slot.mount(&host, &container, "https://cantoo.fr").await
        });

        assert_eq!(Some(assigned), mounted.ok());
        slot.unmount(&host).await;
        assert_eq!(slot.assigned().await, assigned);
    }

    #[tokio::test]
    async fn test_navigate_after_unmount_fails() {
        let host = MemoryHost::new();
        let container = host.add_container("root");
        let slot = FrameSlot::new();

        slot.mount(&host, &container, "https://cantoo.fr").await.expect("mount");
        slot.unmount(&host).await;

        let result = slot.navigate(&host, "https://cantoo.fr").await;
        assert!(matches!(result, Err(Error::NoActiveConnection)));
    }
}
