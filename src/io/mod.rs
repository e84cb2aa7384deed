//! The Block Transport: frames MAPI blocks over a TCP stream and exposes
//! them as a line-oriented UTF-8 text channel (`spec.md` §4.1).

mod block_stream;

pub(crate) use block_stream::{split, BlockReader, BlockWriter, ByteOrder, MAX_BLOCK_PAYLOAD};
