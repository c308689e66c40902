// src/recording/overflow.rs
//! Memory-mapped spill file for capture bursts
//!
//! Layout: an 8-byte little-endian header holding the committed end offset,
//! followed by frames of `[u32 LE length][payload]`. Only bytes below the
//! committed offset are trusted when a file is reopened, so frames written
//! before a crash survive and a torn tail is discarded.

use crate::utils::errors::{EngineError, Result};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const HEADER_LEN: usize = 8;
const FRAME_PREFIX: usize = 4;

/// Default initial size of a fresh spill file
pub const DEFAULT_SPILL_BYTES: usize = 1 << 20;

/// Append-only spill file drained as a whole
pub struct OverflowBuffer {
    path: PathBuf,
    file: File,
    mmap: Option<MmapMut>,
    position: usize,
    capacity: usize,
    frames: usize,
}

impl OverflowBuffer {
    /// Open a spill file, recovering frames committed by a previous run
    pub fn open<P: AsRef<Path>>(path: P, initial_capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| EngineError::StorageFailed(format!("Failed to open spill file: {}", e)))?;

        let existing = file
            .metadata()
            .map_err(|e| EngineError::StorageFailed(format!("Failed to stat spill file: {}", e)))?
            .len() as usize;

        let capacity = existing.max(initial_capacity).max(HEADER_LEN + FRAME_PREFIX);
        if capacity != existing {
            file.set_len(capacity as u64).map_err(|e| {
                EngineError::StorageFailed(format!("Failed to size spill file: {}", e))
            })?;
        }

        let mmap = Self::map(&file)?;

        let mut buffer = Self {
            path,
            file,
            mmap: Some(mmap),
            position: HEADER_LEN,
            capacity,
            frames: 0,
        };
        buffer.recover();

        if buffer.frames > 0 {
            debug!(
                "Recovered {} spilled records from {:?}",
                buffer.frames, buffer.path
            );
        }

        Ok(buffer)
    }

    fn map(file: &File) -> Result<MmapMut> {
        // The spill file is private to this process for its lifetime.
        unsafe {
            MmapOptions::new().map_mut(file).map_err(|e| {
                EngineError::StorageFailed(format!("Failed to map spill file: {}", e))
            })
        }
    }

    fn recover(&mut self) {
        let Some(mmap) = self.mmap.as_ref() else {
            return;
        };

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&mmap[..HEADER_LEN]);
        let committed = u64::from_le_bytes(header) as usize;

        if committed < HEADER_LEN || committed > self.capacity {
            self.position = HEADER_LEN;
            self.frames = 0;
            self.write_header();
            return;
        }

        let mut offset = HEADER_LEN;
        let mut frames = 0;
        while offset + FRAME_PREFIX <= committed {
            let len = read_prefix(mmap, offset);
            let end = offset + FRAME_PREFIX + len;
            if end > committed {
                warn!("Discarding torn frame at offset {} in {:?}", offset, self.path);
                break;
            }
            offset = end;
            frames += 1;
        }

        self.position = offset;
        self.frames = frames;
        self.write_header();
    }

    /// Append one frame
    pub fn push(&mut self, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| {
            EngineError::StorageFailed(format!("Spilled record too large: {} bytes", data.len()))
        })?;

        let needed = FRAME_PREFIX + data.len();
        if self.position + needed > self.capacity {
            self.grow(needed)?;
        }

        let mmap = self
            .mmap
            .as_mut()
            .ok_or_else(|| EngineError::StorageFailed("Spill map not available".to_string()))?;

        let start = self.position;
        mmap[start..start + FRAME_PREFIX].copy_from_slice(&len.to_le_bytes());
        mmap[start + FRAME_PREFIX..start + needed].copy_from_slice(data);

        self.position += needed;
        self.frames += 1;
        self.write_header();

        Ok(())
    }

    /// Take every frame, leaving the file empty
    pub fn drain(&mut self) -> Result<Vec<Vec<u8>>> {
        let mmap = self
            .mmap
            .as_ref()
            .ok_or_else(|| EngineError::StorageFailed("Spill map not available".to_string()))?;

        let mut frames = Vec::with_capacity(self.frames);
        let mut offset = HEADER_LEN;
        while offset < self.position {
            let len = read_prefix(mmap, offset);
            let start = offset + FRAME_PREFIX;
            frames.push(mmap[start..start + len].to_vec());
            offset = start + len;
        }

        self.position = HEADER_LEN;
        self.frames = 0;
        self.write_header();
        self.flush()?;

        Ok(frames)
    }

    /// Flush changes to disk
    pub fn flush(&mut self) -> Result<()> {
        if let Some(ref mmap) = self.mmap {
            mmap.flush().map_err(|e| {
                EngineError::StorageFailed(format!("Failed to flush spill file: {}", e))
            })?;
        }
        Ok(())
    }

    fn write_header(&mut self) {
        if let Some(ref mut mmap) = self.mmap {
            mmap[..HEADER_LEN].copy_from_slice(&(self.position as u64).to_le_bytes());
        }
    }

    fn grow(&mut self, additional: usize) -> Result<()> {
        warn!("Growing spill file {:?} by at least {} bytes", self.path, additional);

        self.flush()?;
        self.mmap = None;

        let new_capacity = self.capacity + additional.max(self.capacity);
        self.file.set_len(new_capacity as u64).map_err(|e| {
            EngineError::StorageFailed(format!("Failed to grow spill file: {}", e))
        })?;

        self.mmap = Some(Self::map(&self.file)?);
        self.capacity = new_capacity;

        Ok(())
    }

    /// Number of frames held
    pub fn len(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OverflowBuffer {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

fn read_prefix(mmap: &MmapMut, offset: usize) -> usize {
    let mut prefix = [0u8; FRAME_PREFIX];
    prefix.copy_from_slice(&mmap[offset..offset + FRAME_PREFIX]);
    u32::from_le_bytes(prefix) as usize
}
