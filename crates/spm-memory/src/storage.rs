use spm_core::ConfigError;

/// Offset/length pair that does not fit in the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutOfBounds;

/// Lazily allocated backing store. Chunks that were never written read as zero.
///
/// Offsets are relative to the start of the owning region.
#[derive(Debug, Clone)]
pub(crate) struct SparseStorage {
    size: u64,
    chunk_size: usize,
    chunks: Vec<Option<Box<[u8]>>>,
}

impl SparseStorage {
    pub(crate) const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

    pub(crate) fn new(size: u64) -> Result<Self, ConfigError> {
        Self::with_chunk_size(size, Self::DEFAULT_CHUNK_SIZE)
    }

    pub(crate) fn with_chunk_size(size: u64, chunk_size: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::invalid("storage chunk size", "must be nonzero"));
        }
        let chunk_count = usize::try_from(size.div_ceil(chunk_size as u64)).map_err(|_| {
            ConfigError::invalid("region size", format!("0x{size:x} does not fit in memory"))
        })?;
        Ok(Self {
            size,
            chunk_size,
            chunks: vec![None; chunk_count],
        })
    }

    fn check(&self, offset: u64, len: usize) -> Result<(), OutOfBounds> {
        match offset.checked_add(len as u64) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(OutOfBounds),
        }
    }

    #[inline]
    fn split(&self, offset: u64) -> (usize, usize) {
        let chunk_size = self.chunk_size as u64;
        // Both fit: `offset < size` and the chunk count was checked against `usize` at build time.
        ((offset / chunk_size) as usize, (offset % chunk_size) as usize)
    }

    pub(crate) fn read_into(&self, offset: u64, dst: &mut [u8]) -> Result<(), OutOfBounds> {
        self.check(offset, dst.len())?;
        let mut remaining = dst;
        let mut cur = offset;

        while !remaining.is_empty() {
            let (chunk_idx, chunk_off) = self.split(cur);
            let take = (self.chunk_size - chunk_off).min(remaining.len());

            match self.chunks.get(chunk_idx).and_then(|c| c.as_deref()) {
                Some(chunk) => {
                    remaining[..take].copy_from_slice(&chunk[chunk_off..chunk_off + take])
                }
                None => remaining[..take].fill(0),
            }

            cur += take as u64;
            remaining = &mut remaining[take..];
        }
        Ok(())
    }

    pub(crate) fn write_from(&mut self, offset: u64, src: &[u8]) -> Result<(), OutOfBounds> {
        self.check(offset, src.len())?;
        let mut remaining = src;
        let mut cur = offset;

        while !remaining.is_empty() {
            let (chunk_idx, chunk_off) = self.split(cur);
            let take = (self.chunk_size - chunk_off).min(remaining.len());

            let chunk_size = self.chunk_size;
            let slot = self.chunks.get_mut(chunk_idx).ok_or(OutOfBounds)?;
            let chunk = slot.get_or_insert_with(|| vec![0u8; chunk_size].into_boxed_slice());
            chunk[chunk_off..chunk_off + take].copy_from_slice(&remaining[..take]);

            cur += take as u64;
            remaining = &remaining[take..];
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn allocated_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }
}
