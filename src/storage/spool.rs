use std::{io::SeekFrom, path::Path};
use tempfile::{NamedTempFile, TempPath};
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncSeekExt, AsyncWriteExt},
};

use crate::errors::Result;

/// An upload buffered to a temporary file so its exact length is known
/// before any quota is reserved. The file is removed when the spool drops.
pub struct Spool {
    file: File,
    len: u64,
    _path: TempPath,
}

impl Spool {
    pub async fn capture<R>(reader: &mut R, dir: &Path) -> Result<Self>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let (file, path) = NamedTempFile::new_in(dir)?.into_parts();
        let mut file = File::from_std(file);

        let len = tokio::io::copy(reader, &mut file).await?;
        file.flush().await?;
        file.seek(SeekFrom::Start(0)).await?;

        Ok(Self { file, len, _path: path })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Positioned at the start of the spooled content.
    pub async fn reader(&mut self) -> Result<&mut File> {
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(&mut self.file)
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self._path
    }
}
