pub const PROTOCOL_CONTROL_CSID: u8 = 0x02;
pub const PROTOCOL_CONTROL_MESSAGE_STREAM_ID: u32 = 0;
pub const MAX_CHUNK_SIZE: u32 = 0xFFFFFF;
