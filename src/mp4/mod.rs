pub mod r#box;
pub use r#box::{BoxHeader, BoxType, FourCC, Mp4Box};
pub mod box_reader;
pub use box_reader::BoxReader;
pub mod box_writer;
pub use box_writer::BoxWriter;
pub mod unknown;
pub use unknown::UnknownBox;
pub mod registry;
pub use registry::{read_any_box, walk_boxes, AnyBox, BoxNode};

pub mod ftyp;
pub mod mdat;
pub mod moov;
pub mod mvhd;
pub mod trak;
pub mod tkhd;
pub mod mdhd;
pub mod hdlr;
pub mod minf;
pub mod stbl;
pub mod stsd;
pub mod stts;
pub mod ctts;
pub mod stss;
pub mod sdtp;
pub mod stsc;
pub mod stsz;
pub mod stco;
pub mod avcc;
pub use avcc::AvccConfig;

pub mod mvex;
pub mod moof;
pub mod trun;
pub mod mfra;
pub mod smooth;

pub mod sample_table;
pub use sample_table::SampleTable;
pub mod table_builder;
pub use table_builder::{BuiltTables, TableBuilder, TableOptions};

mod table_builder_test;
