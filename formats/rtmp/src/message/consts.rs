///! data message handler names, @setDataFrame tells the peer to cache the
///! following metadata and replay it to late joiners
pub const SET_DATA_FRAME: &str = "@setDataFrame";
pub const CLEAR_DATA_FRAME: &str = "@clearDataFrame";
pub const ON_META_DATA: &str = "onMetaData";
