//! Connected client registry and disconnect tracking
//!
//! This module owns the server-side view of every connection that finished
//! its handshake:
//! - ID allocation for new connections
//! - The outbound frame channel feeding each client's writer task
//! - The per-client disconnect state machine
//!
//! A client whose frame cannot be delivered is not dropped immediately. It is
//! first marked so that one more frame can report its tank as disconnected to
//! everyone else, and only removed on the following frame. A client whose
//! queue is full counts as undeliverable, the same as one whose writer is
//! gone.

use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// Frames a client may have queued before it is treated as disconnected
pub const OUTBOUND_QUEUE_FRAMES: usize = 64;

/// Where a client is in the disconnect sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisconnectState {
    /// Connected and receiving frames
    #[default]
    Unhandled,
    /// A send failed; the next frame reports the tank as disconnected
    Sent,
    /// Removed from the registry; set on the clients `advance_disconnects` returns
    Handled,
}

/// A connected client
///
/// Dropping a `Client` drops its close handle, which stops the connection's
/// reader task.
#[derive(Debug)]
pub struct Client {
    /// Player ID shared with the client's tank
    pub id: u32,
    pub name: String,
    pub addr: SocketAddr,
    /// Complete frames queued for the writer task
    pub outbound: mpsc::Sender<String>,
    pub disconnect: DisconnectState,
    _close: oneshot::Sender<()>,
}

impl Client {
    pub fn new(
        id: u32,
        name: String,
        addr: SocketAddr,
        outbound: mpsc::Sender<String>,
        close: oneshot::Sender<()>,
    ) -> Self {
        Self {
            id,
            name,
            addr,
            outbound,
            disconnect: DisconnectState::Unhandled,
            _close: close,
        }
    }

    /// Queues a frame for delivery without waiting.
    ///
    /// Returns false if the writer is gone or has fallen
    /// [`OUTBOUND_QUEUE_FRAMES`] behind.
    pub fn send(&self, frame: &str) -> bool {
        match self.outbound.try_send(frame.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Client {} outbound queue is full", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Registry of all handshaken clients
///
/// Clients are kept in ID order so broadcasts visit them deterministically.
#[derive(Debug, Default)]
pub struct ClientManager {
    clients: BTreeMap<u32, Client>,
    /// Next ID handed out by `allocate_id`; IDs are never reused
    next_client_id: u32,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next player ID
    ///
    /// IDs start at 0 and increase by one per handshake, whether or not the
    /// connection survives long to join.
    pub fn allocate_id(&mut self) -> u32 {
        let id = self.next_client_id;
        self.next_client_id += 1;
        id
    }

    pub fn add_client(&mut self, client: Client) {
        info!(
            "Client {} ({:?}) connected from {}",
            client.id, client.name, client.addr
        );
        self.clients.insert(client.id, client);
    }

    /// Removes a client, dropping its channels
    pub fn remove_client(&mut self, client_id: u32) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn client(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Sends `frame` to every client still in [`DisconnectState::Unhandled`]
    ///
    /// Returns the IDs of clients whose send failed. Their state is left
    /// untouched; pass the result to [`ClientManager::advance_disconnects`]
    /// once the game has been told.
    pub fn broadcast(&self, frame: &str) -> Vec<u32> {
        let mut failed = Vec::new();

        for client in self.clients.values() {
            if client.disconnect != DisconnectState::Unhandled {
                continue;
            }
            if !client.send(frame) {
                warn!("Failed to send frame to client {}", client.id);
                failed.push(client.id);
            }
        }

        failed
    }

    /// Moves the disconnect state machine forward by one frame
    ///
    /// Clients already in [`DisconnectState::Sent`] are removed, moved to
    /// `Handled` and returned so the caller can drop their tanks. Then every
    /// ID in `newly_failed` moves to `Sent`.
    pub fn advance_disconnects(&mut self, newly_failed: &[u32]) -> Vec<Client> {
        let sent: Vec<u32> = self
            .clients
            .values()
            .filter(|client| client.disconnect == DisconnectState::Sent)
            .map(|client| client.id)
            .collect();

        let mut finished = Vec::with_capacity(sent.len());
        for client_id in sent {
            if let Some(mut client) = self.remove_client(client_id) {
                client.disconnect = DisconnectState::Handled;
                finished.push(client);
            }
        }

        for client_id in newly_failed {
            if let Some(client) = self.clients.get_mut(client_id) {
                debug!("Client {} marked for removal", client_id);
                client.disconnect = DisconnectState::Sent;
            }
        }

        finished
    }

    pub fn ids(&self) -> Vec<u32> {
        self.clients.keys().copied().collect()
    }

    /// Returns the number of registered clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:11000".parse().unwrap()
    }

    fn test_client(
        manager: &mut ClientManager,
    ) -> (u32, mpsc::Receiver<String>, oneshot::Receiver<()>) {
        let id = manager.allocate_id();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_FRAMES);
        let (close_tx, close_rx) = oneshot::channel();
        manager.add_client(Client::new(id, format!("p{}", id), test_addr(), tx, close_tx));
        (id, rx, close_rx)
    }

    #[test]
    fn test_ids_are_sequential_from_zero() {
        let mut manager = ClientManager::new();
        assert_eq!(manager.allocate_id(), 0);
        assert_eq!(manager.allocate_id(), 1);
        assert_eq!(manager.allocate_id(), 2);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_add_and_remove_client() {
        let mut manager = ClientManager::new();
        let (id, _rx, _close) = test_client(&mut manager);

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.client(id).unwrap().name, "p0");
        assert_eq!(
            manager.client(id).unwrap().disconnect,
            DisconnectState::Unhandled
        );

        assert!(manager.remove_client(id).is_some());
        assert!(manager.remove_client(id).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_broadcast_reaches_every_client() {
        let mut manager = ClientManager::new();
        let (_, mut rx_a, _ca) = test_client(&mut manager);
        let (_, mut rx_b, _cb) = test_client(&mut manager);

        assert!(manager.broadcast("frame\n").is_empty());
        assert_eq!(rx_a.try_recv().unwrap(), "frame\n");
        assert_eq!(rx_b.try_recv().unwrap(), "frame\n");
    }

    #[test]
    fn test_disconnect_state_machine() {
        let mut manager = ClientManager::new();
        let (a, rx_a, _ca) = test_client(&mut manager);
        let (b, mut rx_b, _cb) = test_client(&mut manager);

        drop(rx_a);

        // Frame N: send to A fails, A becomes Sent.
        let failed = manager.broadcast("n\n");
        assert_eq!(failed, vec![a]);
        assert!(manager.advance_disconnects(&failed).is_empty());
        assert_eq!(manager.client(a).unwrap().disconnect, DisconnectState::Sent);

        // Frame N+1: A is skipped, then removed.
        let failed = manager.broadcast("n1\n");
        assert!(failed.is_empty());
        let finished = manager.advance_disconnects(&failed);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].id, a);
        assert_eq!(finished[0].disconnect, DisconnectState::Handled);
        assert!(manager.client(a).is_none());

        // Frame N+2: only B remains.
        assert!(manager.broadcast("n2\n").is_empty());
        assert_eq!(manager.ids(), vec![b]);
        assert_eq!(rx_b.try_recv().unwrap(), "n\n");
        assert_eq!(rx_b.try_recv().unwrap(), "n1\n");
        assert_eq!(rx_b.try_recv().unwrap(), "n2\n");
    }

    #[test]
    fn test_full_queue_counts_as_failed_send() {
        let mut manager = ClientManager::new();
        let (tx, mut rx) = mpsc::channel(2);
        let (close_tx, _close_rx) = oneshot::channel();
        manager.add_client(Client::new(0, "slow".into(), test_addr(), tx, close_tx));

        assert!(manager.broadcast("1\n").is_empty());
        assert!(manager.broadcast("2\n").is_empty());
        assert_eq!(manager.broadcast("3\n"), vec![0]);

        // Nothing past the capacity was queued.
        assert_eq!(rx.try_recv().unwrap(), "1\n");
        assert_eq!(rx.try_recv().unwrap(), "2\n");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_removing_client_closes_reader_signal() {
        let mut manager = ClientManager::new();
        let (id, _rx, mut close_rx) = test_client(&mut manager);

        assert!(close_rx.try_recv().is_err());
        manager.remove_client(id);
        assert!(matches!(
            close_rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let mut manager = ClientManager::new();
        assert!(manager.advance_disconnects(&[7]).is_empty());
        assert!(manager.broadcast("x\n").is_empty());
    }
}
