use crate::channel::{
    FileAssembler, Inbound, OutgoingFile, Outbound, PendingQueue, chunk, receipt_for,
    transfer_label,
};
use crate::config::PeerConfig;
use crate::connector::{ChannelOptions, ChannelPayload, DataChannel, PeerConnector};
use crate::error::{PeerError, Result};
use parley_core::utils::CHAT_CHANNEL_LABEL;
use parley_core::{ChatFrame, FileMetadata, PeerId, Receipt};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct OutgoingTransfer {
    channel: Arc<dyn DataChannel>,
    file: OutgoingFile,
    started: bool,
}

struct IncomingTransfer {
    channel: Arc<dyn DataChannel>,
    assembler: Option<FileAssembler>,
}

struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Data channels of one session and everything still waiting to cross them.
///
/// The pending queue outlives channel sets: a reset detaches the channels of
/// the discarded connection but keeps undelivered payloads for the next one.
pub struct ChannelHub {
    peer_id: PeerId,
    chunk_size: usize,
    file_prefix: String,
    chat: RefCell<Option<Arc<dyn DataChannel>>>,
    pending: RefCell<PendingQueue<Outbound>>,
    outgoing: RefCell<HashMap<String, OutgoingTransfer>>,
    incoming: RefCell<HashMap<String, IncomingTransfer>>,
    flushing: Cell<bool>,
}

impl ChannelHub {
    pub fn new(peer_id: PeerId, config: &PeerConfig) -> Self {
        Self {
            peer_id,
            chunk_size: config.chunk_size,
            file_prefix: config.file_label_prefix.clone(),
            chat: RefCell::new(None),
            pending: RefCell::new(PendingQueue::new()),
            outgoing: RefCell::new(HashMap::new()),
            incoming: RefCell::new(HashMap::new()),
            flushing: Cell::new(false),
        }
    }

    pub fn attach_chat(&self, channel: Arc<dyn DataChannel>) {
        *self.chat.borrow_mut() = Some(channel);
    }

    /// Forgets every channel of the current connection. Transfers that were
    /// never acknowledged go back to the pending queue, oldest first.
    pub fn detach(&self) {
        self.chat.borrow_mut().take();
        self.incoming.borrow_mut().clear();

        let mut unacknowledged: Vec<_> = self
            .outgoing
            .borrow_mut()
            .drain()
            .map(|(_, transfer)| transfer.file)
            .collect();
        unacknowledged.sort_by_key(|file| file.metadata.timestamp);

        let mut pending = self.pending.borrow_mut();
        for file in unacknowledged {
            pending.push(Outbound::File(file));
        }
    }

    pub fn chat_open(&self) -> bool {
        self.open_chat().is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn pending_items(&self) -> Vec<Outbound> {
        self.pending.borrow().iter().cloned().collect()
    }

    /// Moves every pending item out, oldest first.
    pub fn take_pending(&self) -> Vec<Outbound> {
        let mut pending = self.pending.borrow_mut();
        std::iter::from_fn(|| pending.pop()).collect()
    }

    pub fn adopt_pending(&self, items: Vec<Outbound>) {
        let mut pending = self.pending.borrow_mut();
        for item in items {
            pending.push(item);
        }
    }

    /// Queues `item` behind anything already pending and drains the queue as
    /// far as the open channel allows.
    pub async fn send(&self, connector: Option<&Arc<dyn PeerConnector>>, item: Outbound) {
        self.pending.borrow_mut().push(item);
        self.flush(connector).await;
    }

    /// Delivers pending items in order while the chat channel is open. The
    /// first failure puts the item back at the head and stops the drain.
    pub async fn flush(&self, connector: Option<&Arc<dyn PeerConnector>>) {
        if self.flushing.replace(true) {
            return;
        }
        let _guard = FlushGuard(&self.flushing);

        loop {
            let Some(chat) = self.open_chat() else {
                break;
            };
            let Some(item) = self.pending.borrow_mut().pop() else {
                break;
            };

            if let Err(e) = self.deliver(&chat, connector, &item).await {
                warn!(peer = %self.peer_id, "Delivery failed, requeueing: {}", e);
                self.pending.borrow_mut().push_front(item);
                break;
            }
        }
    }

    pub async fn on_channel_open(&self, label: &str, connector: Option<&Arc<dyn PeerConnector>>) {
        if label == CHAT_CHANNEL_LABEL {
            info!(peer = %self.peer_id, "Chat channel open");
            self.flush(connector).await;
        } else {
            self.stream_file(label).await;
        }
    }

    pub fn on_channel_announced(&self, channel: Arc<dyn DataChannel>) {
        let label = channel.label().to_owned();
        if !label.starts_with(&self.file_prefix) {
            debug!(peer = %self.peer_id, "Ignoring announced channel '{}'", label);
            return;
        }

        self.incoming.borrow_mut().insert(
            label,
            IncomingTransfer {
                channel,
                assembler: None,
            },
        );
    }

    pub fn on_channel_closed(&self, label: &str) {
        self.outgoing.borrow_mut().remove(label);
        self.incoming.borrow_mut().remove(label);
    }

    pub async fn on_channel_message(
        &self,
        label: &str,
        payload: ChannelPayload,
        connector: Option<&Arc<dyn PeerConnector>>,
    ) -> Result<Option<Inbound>> {
        if label == CHAT_CHANNEL_LABEL {
            return self.on_chat_frame(payload, connector).await;
        }

        if self.outgoing.borrow().contains_key(label) {
            let ChannelPayload::Text(text) = payload else {
                debug!(peer = %self.peer_id, "Binary frame on outgoing transfer '{}'", label);
                return Ok(None);
            };
            let receipt: Receipt = serde_json::from_str(&text)?;
            self.complete_transfer(label, receipt.id).await;
            return Ok(Some(Inbound::Receipt(receipt)));
        }

        self.on_file_frame(label, payload, connector).await
    }

    async fn on_chat_frame(
        &self,
        payload: ChannelPayload,
        connector: Option<&Arc<dyn PeerConnector>>,
    ) -> Result<Option<Inbound>> {
        let ChannelPayload::Text(text) = payload else {
            debug!(peer = %self.peer_id, "Binary frame on chat channel");
            return Ok(None);
        };

        match serde_json::from_str::<ChatFrame>(&text)? {
            ChatFrame::Message(message) => {
                self.send(connector, Outbound::Receipt(receipt_for(message.timestamp)))
                    .await;
                Ok(Some(Inbound::Message(message)))
            }
            ChatFrame::Receipt(receipt) => Ok(Some(Inbound::Receipt(receipt))),
        }
    }

    async fn on_file_frame(
        &self,
        label: &str,
        payload: ChannelPayload,
        connector: Option<&Arc<dyn PeerConnector>>,
    ) -> Result<Option<Inbound>> {
        let (channel, finished) = {
            let mut incoming = self.incoming.borrow_mut();
            let Some(transfer) = incoming.get_mut(label) else {
                debug!(peer = %self.peer_id, "Frame on unknown channel '{}'", label);
                return Ok(None);
            };

            let finished = match payload {
                ChannelPayload::Text(text) => {
                    let metadata: FileMetadata = serde_json::from_str(&text)?;
                    debug!(peer = %self.peer_id, "Receiving '{}' ({} bytes)", metadata.name, metadata.size);
                    let assembler = FileAssembler::new(label, metadata);
                    if assembler.is_complete() {
                        Some(assembler.finish())
                    } else {
                        transfer.assembler = Some(assembler);
                        None
                    }
                }
                ChannelPayload::Binary(data) => {
                    let Some(assembler) = transfer.assembler.as_mut() else {
                        return Err(PeerError::UnexpectedChunk(label.to_owned()));
                    };
                    match assembler.push(&data) {
                        Ok(true) => transfer.assembler.take().map(FileAssembler::finish),
                        Ok(false) => None,
                        Err(e) => {
                            transfer.assembler = None;
                            return Err(e);
                        }
                    }
                }
            };

            (transfer.channel.clone(), finished)
        };

        let Some(file) = finished else {
            return Ok(None);
        };

        let receipt = receipt_for(file.metadata.timestamp);
        let acked = match serde_json::to_string(&receipt) {
            Ok(json) => channel.send_text(json).await.is_ok(),
            Err(_) => false,
        };
        if !acked {
            self.send(connector, Outbound::Receipt(receipt)).await;
        }

        Ok(Some(Inbound::File(file)))
    }

    fn open_chat(&self) -> Option<Arc<dyn DataChannel>> {
        self.chat
            .borrow()
            .as_ref()
            .filter(|channel| channel.is_open())
            .cloned()
    }

    async fn deliver(
        &self,
        chat: &Arc<dyn DataChannel>,
        connector: Option<&Arc<dyn PeerConnector>>,
        item: &Outbound,
    ) -> Result<()> {
        match item {
            Outbound::Chat(message) => chat.send_text(serde_json::to_string(message)?).await,
            Outbound::Receipt(receipt) => chat.send_text(serde_json::to_string(receipt)?).await,
            Outbound::File(file) => {
                let connector = connector.ok_or(PeerError::NotConnected)?;
                self.start_transfer(connector, file.clone()).await
            }
        }
    }

    async fn start_transfer(
        &self,
        connector: &Arc<dyn PeerConnector>,
        file: OutgoingFile,
    ) -> Result<()> {
        let label = transfer_label(&self.file_prefix, &file.metadata);
        let channel = connector
            .create_data_channel(&label, ChannelOptions::default())
            .await?;
        let open = channel.is_open();

        info!(peer = %self.peer_id, "Opening transfer channel '{}'", label);
        self.outgoing.borrow_mut().insert(
            label.clone(),
            OutgoingTransfer {
                channel,
                file,
                started: false,
            },
        );

        if open {
            self.stream_file(&label).await;
        }
        Ok(())
    }

    async fn stream_file(&self, label: &str) {
        let (channel, file) = {
            let mut outgoing = self.outgoing.borrow_mut();
            match outgoing.get_mut(label) {
                Some(transfer) if !transfer.started => {
                    transfer.started = true;
                    (transfer.channel.clone(), transfer.file.clone())
                }
                _ => return,
            }
        };

        if let Err(e) = self.send_file_frames(channel.as_ref(), &file).await {
            warn!(peer = %self.peer_id, "Transfer on '{}' failed, requeueing: {}", label, e);
            self.outgoing.borrow_mut().remove(label);
            let _ = channel.close().await;
            self.pending.borrow_mut().push(Outbound::File(file));
        }
    }

    async fn send_file_frames(&self, channel: &dyn DataChannel, file: &OutgoingFile) -> Result<()> {
        channel
            .send_text(serde_json::to_string(&file.metadata)?)
            .await?;
        for piece in chunk(&file.data, self.chunk_size) {
            channel.send_binary(piece).await?;
        }
        Ok(())
    }

    /// Closes the transfer on `label` once its receipt names the file it
    /// carries. Receipts only count on the transfer's own channel.
    async fn complete_transfer(&self, label: &str, id: i64) {
        let finished = {
            let mut outgoing = self.outgoing.borrow_mut();
            let matches = outgoing
                .get(label)
                .map(|transfer| transfer.file.metadata.timestamp == id);
            match matches {
                Some(true) => outgoing.remove(label),
                Some(false) => {
                    debug!(
                        peer = %self.peer_id,
                        "Receipt {} does not match transfer '{}'",
                        id,
                        label
                    );
                    None
                }
                None => None,
            }
        };

        if let Some(transfer) = finished {
            debug!(peer = %self.peer_id, "Transfer '{}' acknowledged", label);
            let _ = transfer.channel.close().await;
        }
    }
}
