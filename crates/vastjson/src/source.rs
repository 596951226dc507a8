//! Positional access to the bytes of a JSON document.
//!
//! A [`ByteSource`] is immutable for its whole lifetime: offsets recorded
//! against it stay valid until it is dropped. In-memory and memory-mapped
//! sources hand out borrowed slices; the streaming source copies each window
//! out of the open file.

use std::{
    borrow::Cow,
    fmt,
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

use memmap2::Mmap;

use crate::{
    error::{Error, SourceError},
    options::OpenMode,
};

/// A fixed sequence of bytes holding JSON text.
pub trait ByteSource: fmt::Debug + Send {
    /// Total length in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads exactly `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// [`SourceError::OutOfRange`] if `offset + len` exceeds [`len`], or
    /// [`SourceError::Io`] if the underlying file read fails.
    ///
    /// [`len`]: ByteSource::len
    fn read(&mut self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>, SourceError>;

    /// Short name of the backing storage, for diagnostics.
    fn kind(&self) -> &'static str;
}

fn check_range(offset: usize, len: usize, source_len: usize) -> Result<(), SourceError> {
    match offset.checked_add(len) {
        Some(end) if end <= source_len => Ok(()),
        _ => Err(SourceError::OutOfRange {
            offset,
            len,
            source_len,
        }),
    }
}

/// JSON text held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    bytes: Box<[u8]>,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read(&mut self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>, SourceError> {
        check_range(offset, len, self.bytes.len())?;
        Ok(Cow::Borrowed(&self.bytes[offset..offset + len]))
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

/// A read-only memory map of a file.
#[derive(Debug)]
pub struct MmapSource {
    map: Mmap,
}

impl ByteSource for MmapSource {
    fn len(&self) -> usize {
        self.map.len()
    }

    fn read(&mut self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>, SourceError> {
        check_range(offset, len, self.map.len())?;
        Ok(Cow::Borrowed(&self.map[offset..offset + len]))
    }

    fn kind(&self) -> &'static str {
        "mmap"
    }
}

/// An open file read window by window; the handle lives as long as the source.
#[derive(Debug)]
pub struct StreamSource {
    file: File,
    len: usize,
}

impl ByteSource for StreamSource {
    fn len(&self) -> usize {
        self.len
    }

    fn read(&mut self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>, SourceError> {
        check_range(offset, len, self.len)?;
        let mut buf = vec![0; len];
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(&mut buf)?;
        Ok(Cow::Owned(buf))
    }

    fn kind(&self) -> &'static str {
        "stream"
    }
}

/// Opens `path` as a byte source using the access policy selected by `mode`.
///
/// Any file handle opened here is dropped before returning on failure.
///
/// # Errors
///
/// [`Error::Initialization`] if the file cannot be opened, sized, read or
/// mapped, or if it is empty.
pub fn open_file(path: &Path, mode: OpenMode) -> Result<Box<dyn ByteSource>, Error> {
    let io_failure = |reason: &str, err: std::io::Error| Error::Initialization {
        reason: format!("{reason} {}", path.display()),
        source: Some(SourceError::Io(err)),
    };

    let mut file = File::open(path).map_err(|err| io_failure("cannot open", err))?;
    let len = file
        .metadata()
        .map_err(|err| io_failure("cannot stat", err))?
        .len();
    let len = usize::try_from(len)
        .map_err(|_| Error::init(format!("{} is too large to address", path.display())))?;
    if len == 0 {
        return Err(Error::init(format!("{} is empty", path.display())));
    }

    let source: Box<dyn ByteSource> = match mode {
        OpenMode::Preload => {
            let mut bytes = Vec::with_capacity(len);
            file.read_to_end(&mut bytes)
                .map_err(|err| io_failure("cannot read", err))?;
            Box::new(MemorySource::new(bytes))
        }
        OpenMode::Mmap => {
            // Read-only mapping. Truncating the file underneath an open
            // document is undefined behavior, as for any mapped file.
            let map = unsafe { Mmap::map(&file) }.map_err(|err| io_failure("cannot map", err))?;
            Box::new(MmapSource { map })
        }
        OpenMode::Stream => Box::new(StreamSource { file, len }),
    };
    Ok(source)
}
