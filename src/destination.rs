use crate::types::Combination;
use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Append-only line sink that receives every completed combination.
///
/// A destination is opened once per run and ends in exactly one of
/// [`finalize`](Destination::finalize) or [`abandon`](Destination::abandon).
pub trait Destination: Send {
    /// What a finalized destination hands back to the caller.
    type Output: Send;

    /// Appends `value` followed by `\n`.
    ///
    /// # Errors
    /// Any I/O error from the underlying sink. The run treats it as fatal.
    fn append(&mut self, value: &Combination) -> io::Result<()>;

    /// Flushes and publishes everything appended so far.
    ///
    /// # Errors
    /// Any I/O error while flushing or publishing.
    fn finalize(self) -> io::Result<Self::Output>
    where
        Self: Sized;

    /// Discards the output of a failed run.
    fn abandon(self)
    where
        Self: Sized;
}

/// Buffered destination over any writer.
#[derive(Debug)]
pub struct WriterDestination<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> WriterDestination<W> {
    /// Wraps `writer` in a buffer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Wraps `writer` in a buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize, writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, writer),
        }
    }
}

impl<W: Write + Send> Destination for WriterDestination<W> {
    type Output = W;

    fn append(&mut self, value: &Combination) -> io::Result<()> {
        match value {
            Combination::Digits(digits) => {
                self.writer.write_all(digits.as_str().as_bytes())?;
                self.writer.write_all(b"\n")
            }
            Combination::Numeric(_) => writeln!(self.writer, "{value}"),
        }
    }

    fn finalize(self) -> io::Result<W> {
        self.writer
            .into_inner()
            .map_err(io::IntoInnerError::into_error)
    }

    fn abandon(self) {
        // Buffered bytes are dropped without reaching the writer.
        let (_writer, _unwritten) = self.writer.into_parts();
    }
}

/// Text file destination published atomically.
///
/// Lines go to `<path>.partial`; finalizing flushes, syncs and renames it to
/// `path`. A destination that is abandoned, or dropped without finalizing,
/// removes the partial file, so a failed run leaves nothing at `path`.
#[derive(Debug)]
pub struct FileDestination {
    path: PathBuf,
    partial: PathBuf,
    inner: Option<WriterDestination<File>>,
}

impl FileDestination {
    /// Creates (or truncates) the partial file next to `path`.
    ///
    /// # Errors
    /// If the partial file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let partial = partial_path(&path);
        let file = File::create(&partial)?;
        tracing::debug!(partial = %partial.display(), "opened destination");
        Ok(Self {
            path,
            partial,
            inner: Some(WriterDestination::new(file)),
        })
    }

    /// Final location of the output.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location written to until the run is finalized.
    #[must_use]
    pub fn partial_path(&self) -> &Path {
        &self.partial
    }

    fn publish(&mut self) -> io::Result<PathBuf> {
        let inner = self
            .inner
            .take()
            .expect("FileDestination::publish: [1]");
        let published = inner
            .finalize()
            .and_then(|file| file.sync_all())
            .and_then(|()| fs::rename(&self.partial, &self.path));
        if let Err(err) = published {
            // The rename never happened, so only the partial file can exist.
            remove_partial(&self.partial);
            return Err(err);
        }
        Ok(self.path.clone())
    }
}

impl Destination for FileDestination {
    type Output = PathBuf;

    fn append(&mut self, value: &Combination) -> io::Result<()> {
        self.inner
            .as_mut()
            .expect("FileDestination::append: [1]")
            .append(value)
    }

    fn finalize(mut self) -> io::Result<PathBuf> {
        let path = self.publish()?;
        tracing::debug!(path = %path.display(), "published destination");
        Ok(path)
    }

    fn abandon(self) {
        drop(self);
    }
}

impl Drop for FileDestination {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        inner.abandon();
        remove_partial(&self.partial);
    }
}

fn remove_partial(partial: &Path) {
    if let Err(err) = fs::remove_file(partial) {
        tracing::warn!(
            partial = %partial.display(),
            error = %err,
            "failed to remove partial output"
        );
    } else {
        tracing::debug!(partial = %partial.display(), "removed partial output");
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}
