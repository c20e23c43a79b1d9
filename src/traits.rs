use crate::errors::LvzResult;
use bytes::{Bytes, BytesMut};

pub trait LvzParser {
    fn from_bytes(data: &mut Bytes) -> LvzResult<Self>
    where
        Self: Sized;
}

pub trait LvzWriter {
    fn to_bytes(&self, buffer: &mut BytesMut) -> LvzResult<()>;
}
