pub const USER_CONTROL_CSID: u8 = 0x02;
pub const USER_CONTROL_MESSAGE_STREAM_ID: u32 = 0;
pub const USER_CONTROL_MESSAGE_TYPE: u8 = 4;
