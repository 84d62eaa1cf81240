use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::{
    code_item::CodeItem,
    dex_file::{ClassDef, Header, SectionRef},
    leb128, DexFileError, Result,
};

type Endian = LittleEndian;

const DEX_MAGIC_PREFIX: &[u8; 4] = b"dex\n";
const ENDIAN_CONSTANT: u32 = 0x1234_5678;

pub(crate) const CLASS_DEF_SIZE: usize = 0x20;

pub(crate) struct Parser<'a> {
    r: Cursor<&'a [u8]>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { r: Cursor::new(buf) }
    }

    pub(crate) fn at(buf: &'a [u8], offset: usize) -> Self {
        let mut r = Cursor::new(buf);
        r.set_position(offset as u64);
        Self { r }
    }

    pub(crate) fn parse_header(&mut self) -> Result<Header> {
        let version = self.parse_magic_identifier()?;
        let checksum = self.read_u32()?;
        let mut signature = [0u8; 20];
        self.r.read_exact(&mut signature)?;
        let file_size = self.read_u32()?;
        let header_size = self.read_u32()?;
        let endian_tag = self.read_u32()?;
        if endian_tag != ENDIAN_CONSTANT {
            return Err(DexFileError::UnsupportedEndianTag(endian_tag));
        }
        let link = self.parse_section_ref()?;
        let map_off = self.read_u32()?;
        let string_ids = self.parse_section_ref()?;
        let type_ids = self.parse_section_ref()?;
        let proto_ids = self.parse_section_ref()?;
        let field_ids = self.parse_section_ref()?;
        let method_ids = self.parse_section_ref()?;
        let class_defs = self.parse_section_ref()?;
        let data = self.parse_section_ref()?;

        Ok(Header {
            version,
            checksum,
            signature,
            file_size,
            header_size,
            endian_tag,
            link,
            map_off,
            string_ids,
            type_ids,
            proto_ids,
            field_ids,
            method_ids,
            class_defs,
            data,
        })
    }

    fn parse_magic_identifier(&mut self) -> Result<u16> {
        let mut magic = [0u8; 8];
        self.r.read_exact(&mut magic)?;

        let digits = &magic[4..7];
        if !magic.starts_with(DEX_MAGIC_PREFIX)
            || magic[7] != 0
            || !digits.iter().all(u8::is_ascii_digit)
        {
            return Err(DexFileError::InvalidMagicIdentifier(magic));
        }

        Ok(digits
            .iter()
            .fold(0u16, |acc, d| acc * 10 + (d - b'0') as u16))
    }

    fn parse_section_ref(&mut self) -> Result<SectionRef> {
        let size = self.read_u32()?;
        let off = self.read_u32()?;

        Ok(SectionRef { size, off })
    }

    pub(crate) fn parse_class_def(&mut self) -> Result<ClassDef> {
        let class_idx = self.read_u16()?;
        let _pad1 = self.read_u16()?;
        let access_flags = self.read_u32()?;
        let superclass_idx = self.read_u16()?;
        let _pad2 = self.read_u16()?;
        let interfaces_off = self.read_u32()?;
        let source_file_idx = self.read_u32()?;
        let annotations_off = self.read_u32()?;
        let class_data_off = self.read_u32()?;
        let static_values_off = self.read_u32()?;

        Ok(ClassDef {
            class_idx,
            access_flags,
            superclass_idx,
            interfaces_off,
            source_file_idx,
            annotations_off,
            class_data_off,
            static_values_off,
        })
    }

    pub(crate) fn parse_code_item(mut self) -> Result<CodeItem<'a>> {
        let registers_size = self.read_u16()?;
        let ins_size = self.read_u16()?;
        let outs_size = self.read_u16()?;
        let tries_size = self.read_u16()?;
        let debug_info_off = self.read_u32()?;
        let insns_size = self.read_u32()?;

        let start = self.r.position() as usize;
        let buf = *self.r.get_ref();
        let insns = buf
            .get(start..start + insns_size as usize * 2)
            .ok_or_else(|| DexFileError::SectionOutOfBounds {
                name: "insns",
                offset: start,
                len: insns_size as usize * 2,
                file_size: buf.len(),
            })?;

        Ok(CodeItem {
            registers_size,
            ins_size,
            outs_size,
            tries_size,
            debug_info_off,
            insns,
        })
    }

    /// Reads a `string_data_item`: the UTF-16 length followed by NUL-terminated MUTF-8 bytes.
    pub(crate) fn parse_string_data(self) -> Result<&'a str> {
        let buf = *self.r.get_ref();
        let offset = self.r.position() as usize;
        let (_utf16_size, start) = leb128::try_decode_unsigned_leb128(buf, offset).ok_or(
            DexFileError::SectionOutOfBounds {
                name: "string_data",
                offset,
                len: 1,
                file_size: buf.len(),
            },
        )?;
        let bytes = buf[start..]
            .split(|b| *b == 0)
            .next()
            .unwrap_or_default();

        std::str::from_utf8(bytes).map_err(|_| DexFileError::InvalidStringData(start))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        Ok(self.r.read_u32::<Endian>()?)
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(self.r.read_u16::<Endian>()?)
    }
}
