use crate::error::NetworkError;
use crossbeam::channel::{unbounded, Receiver, Sender};
use keel_models::Address;
use keel_signature::PublicKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Network identity of a peer, derived from its public key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(String);

impl PeerId {
    /// Derives a peer id from a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        PeerId(Address::from_public_key(public_key).to_string())
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical message channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// transaction gossip
    Transaction,
    /// block propagation
    Block,
    /// consensus votes
    Vote,
}

/// A message routed between peers on a channel
#[derive(Debug, Clone)]
pub struct Message {
    /// channel the message belongs to
    pub channel_id: ChannelId,
    /// opaque payload
    pub content: Vec<u8>,
}

/// Receives the messages of the channels it subscribes to
pub trait MessageHandler: Send + Sync {
    /// Channels this handler wants to receive
    fn channel_ids(&self) -> Vec<ChannelId>;

    /// Called with every inbound message on a subscribed channel
    fn handle_message(&self, peer_id: &PeerId, message: Message) -> Result<(), NetworkError>;
}

type Envelope = (PeerId, Message);

/// In-process messenger endpoint.
///
/// `connect` wires two endpoints bidirectionally; `broadcast` delivers to
/// every directly connected peer; a dispatch thread routes inbound messages
/// to the handlers registered for their channel.
pub struct Messenger {
    id: PeerId,
    inbox_tx: Sender<Envelope>,
    inbox_rx: Mutex<Option<Receiver<Envelope>>>,
    peers: Mutex<HashMap<PeerId, Sender<Envelope>>>,
    handlers: Arc<Mutex<Vec<Arc<dyn MessageHandler>>>>,
}

impl Messenger {
    /// Creates an endpoint identified by `public_key`
    pub fn new(public_key: &PublicKey) -> Self {
        let (inbox_tx, inbox_rx) = unbounded();
        Messenger {
            id: PeerId::from_public_key(public_key),
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
            peers: Mutex::new(HashMap::new()),
            handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// This endpoint's peer id
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Registers a message handler; call before `start`
    pub fn add_message_handler(&self, handler: Arc<dyn MessageHandler>) {
        self.handlers.lock().push(handler);
    }

    /// Connects two endpoints in both directions
    pub fn connect(&self, other: &Messenger) {
        self.peers
            .lock()
            .insert(other.id.clone(), other.inbox_tx.clone());
        other
            .peers
            .lock()
            .insert(self.id.clone(), self.inbox_tx.clone());
        debug!("peer {} connected to peer {}", self.id, other.id);
    }

    /// Number of directly connected peers
    pub fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }

    /// Starts the dispatch thread routing inbound messages to handlers
    pub fn start(&self) -> Result<(), NetworkError> {
        let inbox_rx = self
            .inbox_rx
            .lock()
            .take()
            .ok_or(NetworkError::AlreadyStarted)?;
        let handlers = Arc::clone(&self.handlers);
        let self_id = self.id.clone();
        thread::Builder::new()
            .name(format!("messenger-{}", self_id))
            .spawn(move || {
                for (peer_id, message) in inbox_rx.iter() {
                    let handlers = handlers.lock().clone();
                    for handler in handlers {
                        if !handler.channel_ids().contains(&message.channel_id) {
                            continue;
                        }
                        if let Err(err) = handler.handle_message(&peer_id, message.clone()) {
                            warn!(
                                "peer {}: handler failed on message from {}: {}",
                                self_id, peer_id, err
                            );
                        }
                    }
                }
            })
            .map_err(|err| NetworkError::ChannelError(err.to_string()))?;
        Ok(())
    }

    /// Sends a message to every directly connected peer
    pub fn broadcast(&self, message: Message) -> Result<(), NetworkError> {
        let peers = self.peers.lock();
        for (peer_id, sender) in peers.iter() {
            sender
                .send((self.id.clone(), message.clone()))
                .map_err(|_| {
                    NetworkError::ChannelError(format!("peer {} inbox is closed", peer_id))
                })?;
        }
        Ok(())
    }

    /// Sends a message to one directly connected peer
    pub fn send(&self, peer_id: &PeerId, message: Message) -> Result<(), NetworkError> {
        let peers = self.peers.lock();
        let sender = peers
            .get(peer_id)
            .ok_or_else(|| NetworkError::ChannelError(format!("peer {} is unknown", peer_id)))?;
        sender
            .send((self.id.clone(), message))
            .map_err(|_| NetworkError::ChannelError(format!("peer {} inbox is closed", peer_id)))
    }
}
