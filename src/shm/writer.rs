use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use memmap2::MmapMut;

/// Producer side of the shared frame segment, as the HUB runs it.
///
/// Fixed capacity; every write replaces the previous frame and zero-fills
/// the rest of the segment so readers stop at the first NUL.
pub struct FrameBufferWriter {
    map: MmapMut,
    path: PathBuf,
    capacity: usize,
}

impl FrameBufferWriter {
    pub fn create(dir: impl AsRef<Path>, name: &str, capacity: usize) -> Result<Self> {
        ensure!(capacity > 0, "Frame buffer capacity must be non-zero");
        let path = dir.as_ref().join(name);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("Failed to create frame segment {:?}", path))?;
        file.set_len(capacity as u64)?;

        // SAFETY: this process owns the segment file for the writer's lifetime.
        let map = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            map,
            path,
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the segment content with `payload`.
    pub fn write(&mut self, payload: &[u8]) -> Result<()> {
        ensure!(
            payload.len() < self.capacity,
            "Payload of {} bytes does not fit a {} byte segment",
            payload.len(),
            self.capacity
        );

        self.map[..payload.len()].copy_from_slice(payload);
        self.map[payload.len()..].fill(0);
        self.map.flush().context("Failed to flush frame segment")?;
        Ok(())
    }

    /// Write an encoded image file as base64 text.
    pub fn write_image(&mut self, encoded_image: &[u8]) -> Result<()> {
        let text = STANDARD.encode(encoded_image);
        self.write(text.as_bytes())
    }
}

impl Drop for FrameBufferWriter {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
