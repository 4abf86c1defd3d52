use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    // buffer pool errors
    #[error("frame id out of range")]
    InvalidFrameId,
    #[error("no evictable frame in buffer pool")]
    NoFreeFrame,
    #[error("page not resident in buffer pool")]
    PageNotInBuffer,
    #[error("page already unpinned")]
    PageAlreadyUnpinned,
    #[error("page is pinned")]
    PagePinned,
    // table heap errors
    #[error("tuple not found")]
    TupleNotFound,
    #[error("insufficient free space for in-place update")]
    InsufficientFreeSpaceForInplaceUpdate,
    // transaction errors
    #[error("write-write conflict")]
    WriteConflict,
    #[error("undo log missing")]
    UndoLogMissing,
    // execution errors
    #[error("{0} not supported")]
    NotImplemented(&'static str),
    #[error("IO error")]
    IOError,
    #[error("channel send error")]
    SendError,
}

impl From<std::io::Error> for Error {
    #[inline]
    fn from(_src: std::io::Error) -> Self {
        Error::IOError
    }
}

impl<T> From<flume::SendError<T>> for Error {
    #[inline]
    fn from(_src: flume::SendError<T>) -> Self {
        Error::SendError
    }
}

impl From<flume::RecvError> for Error {
    #[inline]
    fn from(_src: flume::RecvError) -> Self {
        Error::SendError
    }
}
