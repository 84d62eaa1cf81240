use std::fmt;

use log::debug;

use crate::{
    class_accessor::ClassAccessor,
    code_item::CodeItem,
    declassify::Declassifier,
    hiddenapi::{DexHiddenApi, UnhideAccessFlags},
    leb128,
    parser::{Parser, CLASS_DEF_SIZE},
    DexFileError, Result,
};

const STRING_ID_SIZE: usize = 4;
const TYPE_ID_SIZE: usize = 4;
const PROTO_ID_SIZE: usize = 12;
const FIELD_ID_SIZE: usize = 8;
const METHOD_ID_SIZE: usize = 8;

/// Item count and file offset of one of the tables listed in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionRef {
    pub size: u32,
    pub off: u32,
}

#[derive(Debug)]
pub struct Header {
    pub version: u16,
    pub checksum: u32,
    pub signature: [u8; 20],
    pub file_size: u32,
    pub header_size: u32,
    pub endian_tag: u32,
    pub link: SectionRef,
    pub map_off: u32,
    pub string_ids: SectionRef,
    pub type_ids: SectionRef,
    pub proto_ids: SectionRef,
    pub field_ids: SectionRef,
    pub method_ids: SectionRef,
    pub class_defs: SectionRef,
    pub data: SectionRef,
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " Version:        {:03}", self.version)?;
        writeln!(f, " Checksum:       0x{:08x}", self.checksum)?;
        writeln!(f, " File Size:      {}", self.file_size)?;
        writeln!(f, " Header Size:    {}", self.header_size)?;
        writeln!(f, " String Ids:     {} @ 0x{:x}", self.string_ids.size, self.string_ids.off)?;
        writeln!(f, " Type Ids:       {} @ 0x{:x}", self.type_ids.size, self.type_ids.off)?;
        writeln!(f, " Proto Ids:      {} @ 0x{:x}", self.proto_ids.size, self.proto_ids.off)?;
        writeln!(f, " Field Ids:      {} @ 0x{:x}", self.field_ids.size, self.field_ids.off)?;
        writeln!(f, " Method Ids:     {} @ 0x{:x}", self.method_ids.size, self.method_ids.off)?;
        writeln!(f, " Class Defs:     {} @ 0x{:x}", self.class_defs.size, self.class_defs.off)?;
        writeln!(f, " Data Size:      {}", self.data.size)?;

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassDef {
    pub class_idx: u16,
    pub access_flags: u32,
    pub superclass_idx: u16,
    pub interfaces_off: u32,
    pub source_file_idx: u32,
    pub annotations_off: u32,
    pub class_data_off: u32,
    pub static_values_off: u32,
}

/// A dex image over some byte storage.
///
/// The storage is only ever read, except through a [`Declassifier`], which requires the storage to
/// be mutable and the `DexFile` to be borrowed exclusively.
pub struct DexFile<T> {
    data: T,
    header: Header,
}

impl<T: AsRef<[u8]>> DexFile<T> {
    pub fn parse(data: T) -> Result<Self> {
        let buf = data.as_ref();
        let header = Parser::new(buf).parse_header()?;

        let file_size = buf.len();
        check_table("string_ids", header.string_ids, STRING_ID_SIZE, file_size)?;
        check_table("type_ids", header.type_ids, TYPE_ID_SIZE, file_size)?;
        check_table("proto_ids", header.proto_ids, PROTO_ID_SIZE, file_size)?;
        check_table("field_ids", header.field_ids, FIELD_ID_SIZE, file_size)?;
        check_table("method_ids", header.method_ids, METHOD_ID_SIZE, file_size)?;
        check_table("class_defs", header.class_defs, CLASS_DEF_SIZE, file_size)?;

        debug!(
            "Parsed dex {:03} header: {} strings, {} types, {} class defs",
            header.version, header.string_ids.size, header.type_ids.size, header.class_defs.size
        );

        Ok(Self { data, header })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn into_inner(self) -> T {
        self.data
    }

    pub fn num_class_defs(&self) -> u32 {
        self.header.class_defs.size
    }

    pub fn class_def(&self, class_def_idx: u32) -> Result<ClassDef> {
        if class_def_idx >= self.num_class_defs() {
            return Err(DexFileError::ClassDefIndexOutOfRange(
                class_def_idx,
                self.num_class_defs(),
            ));
        }

        let offset = self.header.class_defs.off as usize + class_def_idx as usize * CLASS_DEF_SIZE;
        Parser::at(self.data(), offset).parse_class_def()
    }

    pub fn class_defs(&self) -> impl Iterator<Item = Result<ClassDef>> + '_ {
        (0..self.num_class_defs()).map(move |idx| self.class_def(idx))
    }

    /// Start of the class data stream of `class_def`, or `None` for a class without fields and
    /// methods.
    pub fn class_data_offset(&self, class_def: &ClassDef) -> Option<usize> {
        match class_def.class_data_off {
            0 => None,
            off => Some(off as usize),
        }
    }

    pub fn string_data(&self, string_idx: u32) -> Result<&str> {
        let ids = self.header.string_ids;
        if string_idx >= ids.size {
            return Err(DexFileError::StringIndexOutOfRange(string_idx, ids.size));
        }

        let string_data_off =
            Parser::at(self.data(), ids.off as usize + string_idx as usize * STRING_ID_SIZE)
                .read_u32()?;
        Parser::at(self.data(), string_data_off as usize).parse_string_data()
    }

    pub fn string_by_type_idx(&self, type_idx: u32) -> Result<&str> {
        let ids = self.header.type_ids;
        if type_idx >= ids.size {
            return Err(DexFileError::TypeIndexOutOfRange(type_idx, ids.size));
        }

        let descriptor_idx =
            Parser::at(self.data(), ids.off as usize + type_idx as usize * TYPE_ID_SIZE)
                .read_u32()?;
        self.string_data(descriptor_idx)
    }

    /// Looks up the code item at `offset`. An offset of zero means the method has no code.
    pub fn code_item(&self, offset: u32) -> Result<Option<CodeItem<'_>>> {
        CodeItem::parse_at(self.data(), offset)
    }

    pub fn class_accessor(&self, class_def_idx: u32) -> Result<ClassAccessor<'_, T>> {
        let class_def = self.class_def(class_def_idx)?;
        if let Some(offset) = self.class_data_offset(&class_def) {
            self.check_class_data_counts(offset)?;
        }
        Ok(ClassAccessor::new(self, class_def_idx, class_def))
    }

    /// The four leading counts of a class data item must lie inside the buffer; the entries after
    /// them are not checked.
    fn check_class_data_counts(&self, offset: usize) -> Result<()> {
        let data = self.data();
        let mut pos = offset;
        for _ in 0..4 {
            (_, pos) = leb128::try_decode_unsigned_leb128(data, pos).ok_or(
                DexFileError::SectionOutOfBounds {
                    name: "class_data",
                    offset,
                    len: pos + 1 - offset,
                    file_size: data.len(),
                },
            )?;
        }
        Ok(())
    }

    pub fn class_accessors(&self) -> impl Iterator<Item = Result<ClassAccessor<'_, T>>> + '_ {
        (0..self.num_class_defs()).map(move |idx| self.class_accessor(idx))
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> DexFile<T> {
    pub fn declassifier(&mut self) -> Declassifier<'_> {
        self.declassifier_with(DexHiddenApi)
    }

    pub fn declassifier_with<U: UnhideAccessFlags>(&mut self, unhider: U) -> Declassifier<'_, U> {
        Declassifier::new(self.data.as_mut(), unhider)
    }

    /// Strips the hidden-API restriction bits from every field and method of every class.
    ///
    /// All entries are decoded before the first byte is rewritten. Returns the number of entries
    /// whose flags changed.
    pub fn unhide_all_apis(&mut self) -> Result<usize> {
        let mut sites = Vec::new();
        for accessor in self.class_accessors() {
            let accessor = accessor?;
            sites.extend(accessor.fields().map(|field| field.access_flags_site()));
            sites.extend(accessor.methods().map(|method| method.access_flags_site()));
        }

        let mut declassifier = self.declassifier();
        let mut unhidden = 0;
        for site in sites {
            if declassifier.unhide_access_flags(site) {
                unhidden += 1;
            }
        }

        debug!("Unhid {} class data entries", unhidden);

        Ok(unhidden)
    }
}

fn check_table(
    name: &'static str,
    table: SectionRef,
    item_size: usize,
    file_size: usize,
) -> Result<()> {
    if table.size == 0 {
        return Ok(());
    }
    check_section(name, table.off as usize, table.size as usize * item_size, file_size)
}

fn check_section(name: &'static str, offset: usize, len: usize, file_size: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= file_size => Ok(()),
        _ => Err(DexFileError::SectionOutOfBounds {
            name,
            offset,
            len,
            file_size,
        }),
    }
}
