use crate::mp4::r#box::{BoxHeader, BoxType};

pub const MDAT: BoxType = BoxType::fourcc(b"mdat");

/// Location of a media data box payload. The payload itself is never loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MdatExtent {
    pub data_offset: u64,
    pub data_size: u64,
}

impl MdatExtent {
    pub fn from_header(header: &BoxHeader) -> Self {
        Self {
            data_offset: header.payload_offset(),
            data_size: header.payload_size(),
        }
    }

    pub fn contains(&self, offset: u64, len: u64) -> bool {
        offset >= self.data_offset && offset + len <= self.data_offset + self.data_size
    }
}
