use std::path::{Path, PathBuf};

use crate::error::Result;

/// Source of the current frame payload.
pub trait FrameSource: Send {
    /// Return the full current payload. Only called after the producer has
    /// signalled that its write is complete.
    fn read_content(&mut self) -> Result<Vec<u8>>;
}

/// Read-only view of the HUB's shared frame segment.
///
/// The segment is opened fresh on every read and never created from this
/// side.
#[derive(Debug, Clone)]
pub struct SharedFrameBuffer {
    name: String,
    dir: PathBuf,
}

impl SharedFrameBuffer {
    pub fn new(name: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file of the segment on Unix.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }
}

impl FrameSource for SharedFrameBuffer {
    fn read_content(&mut self) -> Result<Vec<u8>> {
        sys::read_segment(self)
    }
}

/// Payload bytes of a raw segment: everything before the first NUL, with
/// surrounding ASCII whitespace removed.
pub fn payload_of(raw: &[u8]) -> &[u8] {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    raw[..end].trim_ascii()
}

#[cfg(unix)]
mod sys {
    use super::{payload_of, SharedFrameBuffer};
    use crate::error::{BridgeError, Result};
    use memmap2::Mmap;
    use std::fs::File;

    pub fn read_segment(buffer: &SharedFrameBuffer) -> Result<Vec<u8>> {
        let path = buffer.path();
        let open_err = |source: std::io::Error| BridgeError::SharedMemoryOpen {
            path: path.clone(),
            source,
        };

        let file = File::open(&path).map_err(open_err)?;
        if file.metadata().map_err(open_err)?.len() == 0 {
            return Ok(Vec::new());
        }

        // SAFETY: the mapping is read-only and dropped before returning. The
        // HUB does not write between its ready signal and our release.
        let map = unsafe { Mmap::map(&file) }.map_err(open_err)?;
        Ok(payload_of(&map).to_vec())
    }
}

#[cfg(windows)]
mod sys {
    use super::{payload_of, SharedFrameBuffer};
    use crate::error::{BridgeError, Result};
    use std::io;
    use std::path::PathBuf;
    use windows::core::HSTRING;
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Memory::{
        MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, VirtualQuery, FILE_MAP_READ,
        MEMORY_BASIC_INFORMATION,
    };

    pub fn read_segment(buffer: &SharedFrameBuffer) -> Result<Vec<u8>> {
        let open_err = |source: io::Error| BridgeError::SharedMemoryOpen {
            path: PathBuf::from(buffer.name()),
            source,
        };
        let name = HSTRING::from(buffer.name());

        // SAFETY: the view is only read through a slice bounded by the region
        // size VirtualQuery reports, and both handles are released below.
        unsafe {
            let handle = OpenFileMappingW(FILE_MAP_READ.0, false, &name)
                .map_err(|e| open_err(io::Error::from(e)))?;

            let view = MapViewOfFile(handle, FILE_MAP_READ, 0, 0, 0);
            if view.Value.is_null() {
                let err = io::Error::last_os_error();
                let _ = CloseHandle(handle);
                return Err(open_err(err));
            }

            let mut info = MEMORY_BASIC_INFORMATION::default();
            let queried = VirtualQuery(
                Some(view.Value as *const _),
                &mut info,
                std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            );
            let len = if queried == 0 { 0 } else { info.RegionSize };

            let raw = std::slice::from_raw_parts(view.Value as *const u8, len);
            let payload = payload_of(raw).to_vec();

            let _ = UnmapViewOfFile(view);
            let _ = CloseHandle(handle);
            Ok(payload)
        }
    }
}
