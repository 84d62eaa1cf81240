use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::{parser::Parser, Result};

/// The executable body of a method, as referenced by the code offset of a class data entry.
pub struct CodeItem<'a> {
    pub registers_size: u16,
    pub ins_size: u16,
    pub outs_size: u16,
    pub tries_size: u16,
    pub debug_info_off: u32,
    pub insns: &'a [u8],
}

impl<'a> CodeItem<'a> {
    pub(crate) fn parse_at(data: &'a [u8], offset: u32) -> Result<Option<Self>> {
        match offset {
            0 => Ok(None),
            offset => Parser::at(data, offset as usize).parse_code_item().map(Some),
        }
    }

    /// Size of the instruction stream in 16-bit code units.
    pub fn insns_size(&self) -> usize {
        self.insns.len() / 2
    }

    pub fn code_units(&self) -> impl Iterator<Item = u16> + 'a {
        self.insns.chunks_exact(2).map(LittleEndian::read_u16)
    }
}

impl fmt::Debug for CodeItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeItem")
            .field("registers_size", &self.registers_size)
            .field("ins_size", &self.ins_size)
            .field("outs_size", &self.outs_size)
            .field("tries_size", &self.tries_size)
            .field("debug_info_off", &self.debug_info_off)
            .field("insns", &format!("({} code units)", self.insns_size()))
            .finish()
    }
}
