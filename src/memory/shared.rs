use std::fs::File;
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::fs::{FileExt, MetadataExt};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Name given to pools allocated by this crate
pub const ASHMEM_NAME: &str = "ashmem";

/// File descriptors and integers describing a memory object
#[derive(Debug)]
pub struct Handle {
    pub fds: Vec<OwnedFd>,
    pub ints: Vec<i32>,
}

impl Handle {
    /// Duplicate descriptors that are owned by somebody else
    pub fn duplicate_raw(fds: &[RawFd], ints: &[i32]) -> Result<Self> {
        let fds = fds
            .iter()
            .map(|&fd| {
                if fd < 0 {
                    return Err(Error::InvalidArgument(format!("invalid file descriptor {}", fd)));
                }
                // SAFETY: the descriptor is only borrowed for the duration of the dup
                let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
                borrowed.try_clone_to_owned().map_err(Error::from)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fds, ints: ints.to_vec() })
    }

    pub fn try_clone(&self) -> Result<Self> {
        let fds = self
            .fds
            .iter()
            .map(|fd| fd.try_clone().map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fds, ints: self.ints.clone() })
    }

    pub fn raw_fds(&self) -> Vec<RawFd> {
        self.fds.iter().map(AsRawFd::as_raw_fd).collect()
    }
}

impl PartialEq for Handle {
    /// Handles are equal when their descriptors refer to the same files
    fn eq(&self, other: &Self) -> bool {
        self.ints == other.ints
            && self.fds.len() == other.fds.len()
            && self.fds.iter().zip(&other.fds).all(|(a, b)| same_file(a, b))
    }
}

fn same_file(a: &OwnedFd, b: &OwnedFd) -> bool {
    let identity = |fd: &OwnedFd| {
        fd.try_clone()
            .map(File::from)
            .and_then(|file| file.metadata())
            .map(|metadata| (metadata.dev(), metadata.ino()))
    };
    match (identity(a), identity(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Shared memory object that can be sent to a remote endpoint
#[derive(Debug, PartialEq)]
pub struct Memory {
    pub handle: Handle,
    pub size: usize,
    pub name: String,
}

pub type SharedMemory = Arc<Memory>;

impl Memory {
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            handle: self.handle.try_clone()?,
            size: self.size,
            name: self.name.clone(),
        })
    }
}

/// Allocate a zero-filled shared memory pool of `size` bytes
pub fn create_shared_memory(size: usize) -> Result<SharedMemory> {
    let exhausted = |e: std::io::Error| {
        Error::ResourceExhausted(format!("failed to allocate {} bytes of shared memory: {}", size, e))
    };
    let file = tempfile::tempfile().map_err(exhausted)?;
    file.set_len(size as u64).map_err(exhausted)?;

    Ok(Arc::new(Memory {
        handle: Handle { fds: vec![OwnedFd::from(file)], ints: Vec::new() },
        size,
        name: ASHMEM_NAME.to_string(),
    }))
}

/// Bounds-checked byte access to a memory object
#[derive(Debug)]
pub struct MemoryView {
    file: File,
    size: usize,
}

impl MemoryView {
    pub fn new(memory: &Memory) -> Result<Self> {
        let fd = memory.handle.fds.first().ok_or_else(|| {
            Error::InvalidArgument(format!("memory \"{}\" has no file descriptor", memory.name))
        })?;
        Ok(Self { file: File::from(fd.try_clone()?), size: memory.size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn read_at(&self, offset: usize, buffer: &mut [u8]) -> Result<()> {
        self.check_range(offset, buffer.len())?;
        self.file.read_exact_at(buffer, offset as u64)?;
        Ok(())
    }

    pub fn write_at(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        self.file.write_all_at(data, offset as u64)?;
        Ok(())
    }

    fn check_range(&self, offset: usize, length: usize) -> Result<()> {
        match offset.checked_add(length) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(Error::InvalidArgument(format!(
                "range [{}, +{}) exceeds memory of {} bytes",
                offset, length, self.size
            ))),
        }
    }
}
