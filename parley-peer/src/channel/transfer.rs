use crate::channel::now_millis;
use crate::error::{PeerError, Result};
use bytes::{Bytes, BytesMut};
use parley_core::FileMetadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFile {
    pub metadata: FileMetadata,
    pub data: Bytes,
}

impl OutgoingFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            metadata: FileMetadata {
                name: name.into(),
                size: data.len() as u64,
                timestamp: now_millis(),
                mime_type: mime_type.into(),
            },
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    pub metadata: FileMetadata,
    pub data: Bytes,
}

/// Label of the dedicated channel a file travels on.
pub fn transfer_label(prefix: &str, metadata: &FileMetadata) -> String {
    format!("{}{}-{}", prefix, metadata.timestamp, metadata.name)
}

/// Splits `data` into slices of at most `chunk_size` bytes without copying.
pub fn chunk(data: &Bytes, chunk_size: usize) -> impl Iterator<Item = Bytes> + '_ {
    let chunk_size = chunk_size.max(1);
    (0..data.len())
        .step_by(chunk_size)
        .map(move |start| data.slice(start..(start + chunk_size).min(data.len())))
}

/// Reassembles one incoming file from its header and binary chunks.
#[derive(Debug)]
pub struct FileAssembler {
    label: String,
    metadata: FileMetadata,
    buffer: BytesMut,
}

impl FileAssembler {
    pub fn new(label: impl Into<String>, metadata: FileMetadata) -> Self {
        let capacity = usize::try_from(metadata.size).unwrap_or(0);
        Self {
            label: label.into(),
            metadata,
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    pub fn received(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn is_complete(&self) -> bool {
        self.received() == self.metadata.size
    }

    /// Appends a chunk; `Ok(true)` once the declared size is reached exactly.
    pub fn push(&mut self, chunk: &[u8]) -> Result<bool> {
        let received = self.received() + chunk.len() as u64;
        if received > self.metadata.size {
            return Err(PeerError::TransferOverflow {
                label: self.label.clone(),
                expected: self.metadata.size,
                received,
            });
        }

        self.buffer.extend_from_slice(chunk);
        Ok(self.is_complete())
    }

    pub fn finish(self) -> ReceivedFile {
        ReceivedFile {
            metadata: self.metadata,
            data: self.buffer.freeze(),
        }
    }
}
