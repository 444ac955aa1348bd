use crate::error::AccessError;

/// Correlates a [`Response`] with its [`Request`] across asynchronous hops.
///
/// Identifiers are handed out by the [`crate::System`] so they are unique among all outstanding
/// requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Read,
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: RequestId,
    pub addr: u64,
    pub size: u64,
    pub cmd: Command,
    /// Write payload. `None` for reads.
    pub data: Option<Vec<u8>>,
}

impl Request {
    pub fn read(id: RequestId, addr: u64, size: u64) -> Self {
        Self {
            id,
            addr,
            size,
            cmd: Command::Read,
            data: None,
        }
    }

    pub fn write(id: RequestId, addr: u64, data: Vec<u8>) -> Self {
        Self {
            id,
            addr,
            size: data.len() as u64,
            cmd: Command::Write,
            data: Some(data),
        }
    }

    pub fn is_write(&self) -> bool {
        self.cmd == Command::Write
    }

    /// Returns the write payload, checking that it matches `size`.
    pub fn write_payload(&self) -> Result<&[u8], AccessError> {
        let data = self.data.as_deref().unwrap_or(&[]);
        if data.len() as u64 != self.size {
            return Err(AccessError::InvalidAccessSize {
                addr: self.addr,
                size: self.size,
            });
        }
        Ok(data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: RequestId,
    /// Bytes read. `None` for writes and failed requests.
    pub data: Option<Vec<u8>>,
    pub status: Result<(), AccessError>,
}

impl Response {
    pub fn read_ok(id: RequestId, data: Vec<u8>) -> Self {
        Self {
            id,
            data: Some(data),
            status: Ok(()),
        }
    }

    pub fn write_ok(id: RequestId) -> Self {
        Self {
            id,
            data: None,
            status: Ok(()),
        }
    }

    pub fn error(id: RequestId, err: AccessError) -> Self {
        Self {
            id,
            data: None,
            status: Err(err),
        }
    }

    /// Builds the response to `req` from the result of servicing it.
    pub fn for_request(req: &Request, outcome: Result<Option<Vec<u8>>, AccessError>) -> Self {
        match outcome {
            Ok(data) => Self {
                id: req.id,
                data,
                status: Ok(()),
            },
            Err(err) => Self::error(req.id, err),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub fn error_kind(&self) -> Option<AccessError> {
        self.status.err()
    }
}
