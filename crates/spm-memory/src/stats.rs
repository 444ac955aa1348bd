use spm_core::Request;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    /// Requests answered with an error.
    pub errors: u64,
}

impl MemoryStats {
    pub(crate) fn record(&mut self, req: &Request, ok: bool) {
        if !ok {
            self.errors += 1;
        } else if req.is_write() {
            self.writes += 1;
            self.bytes_written += req.size;
        } else {
            self.reads += 1;
            self.bytes_read += req.size;
        }
    }
}
