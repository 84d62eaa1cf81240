use thiserror::Error;

#[derive(Error, Debug)]
pub enum DexFileError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error("Invalid magic identifier: {0:02X?}")]
    InvalidMagicIdentifier([u8; 8]),
    #[error("Unsupported endian tag: 0x{0:08X}")]
    UnsupportedEndianTag(u32),
    #[error("Section {name} (offset 0x{offset:X}, {len} bytes) exceeds file size 0x{file_size:X}")]
    SectionOutOfBounds {
        name: &'static str,
        offset: usize,
        len: usize,
        file_size: usize,
    },
    #[error("Class def index {0} out of range ({1} class defs)")]
    ClassDefIndexOutOfRange(u32, u32),
    #[error("Type index {0} out of range ({1} type ids)")]
    TypeIndexOutOfRange(u32, u32),
    #[error("String index {0} out of range ({1} string ids)")]
    StringIndexOutOfRange(u32, u32),
    #[error("String data at 0x{0:X} is not valid UTF-8")]
    InvalidStringData(usize),
}
