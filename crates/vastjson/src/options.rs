/// How a file-backed document reaches its bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Read the whole file into memory when the document opens.
    Preload,
    /// Map the file read-only and let the OS page it in as it is scanned.
    #[default]
    Mmap,
    /// Keep the file handle open and read one window at a time.
    Stream,
}

impl TryFrom<i32> for OpenMode {
    type Error = i32;

    /// Maps the integer codes used across call boundaries: `0` preload,
    /// `1` mmap, `2` stream.
    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Preload),
            1 => Ok(Self::Mmap),
            2 => Ok(Self::Stream),
            other => Err(other),
        }
    }
}

/// Configuration for opening a [`Document`].
///
/// # Examples
///
/// ```rust
/// use vastjson::{DocumentOptions, OpenMode};
///
/// let options = DocumentOptions {
///     mode: OpenMode::Stream,
///     window_size: 4096,
///     ..Default::default()
/// };
/// assert_eq!(options.max_depth, 512);
/// ```
///
/// [`Document`]: crate::Document
#[derive(Debug, Clone, Copy)]
pub struct DocumentOptions {
    /// Access policy for file-backed documents. Ignored for in-memory text.
    ///
    /// # Default
    ///
    /// [`OpenMode::Mmap`]
    pub mode: OpenMode,

    /// Number of bytes the scanner pulls from the source per refill.
    ///
    /// Larger windows mean fewer reads for [`OpenMode::Stream`]; for in-memory
    /// and mapped sources this only bounds the scanner's scratch buffer.
    /// Values below 1 are treated as 1.
    ///
    /// # Default
    ///
    /// `65536`
    pub window_size: usize,

    /// Deepest array/object nesting accepted while skipping or decoding a
    /// value. Deeper input fails with a parse error instead of exhausting
    /// the stack.
    ///
    /// # Default
    ///
    /// `512`
    pub max_depth: usize,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            mode: OpenMode::default(),
            window_size: 64 * 1024,
            max_depth: 512,
        }
    }
}
