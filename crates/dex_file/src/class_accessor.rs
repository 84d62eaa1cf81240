//! Streaming access to the `class_data_item` of a class.
//!
//! <https://source.android.com/docs/core/runtime/dex-format#class-data-item>
//!
//! The stream holds four counts followed by the static fields, instance fields, direct methods and
//! virtual methods of the class. Entries carry their field or method index as a delta over the
//! previous entry of the same section, and every entry has a data-dependent length, so an entry can
//! only be reached by decoding everything before it. Nothing here validates the stream: decoding
//! past the end of the buffer panics.

use std::{fmt, iter::FusedIterator};

use crate::{
    code_item::CodeItem,
    dex_file::{ClassDef, DexFile},
    hiddenapi::{ApiList, DexHiddenApi, MemberKind},
    leb128, AccessFlags, Result,
};

/// A position inside the dex buffer. Decoding returns a new cursor rather than advancing this one,
/// so copies never affect each other.
#[derive(Clone, Copy)]
pub struct ClassDataCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassDataCursor<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn empty() -> Self {
        Self { data: &[], pos: 0 }
    }

    #[inline]
    pub fn read_uleb128(self) -> (u32, Self) {
        let (value, pos) = leb128::decode_unsigned_leb128(self.data, self.pos);
        (value, Self { pos, ..self })
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    fn data(&self) -> &'a [u8] {
        self.data
    }
}

impl fmt::Debug for ClassDataCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassDataCursor(0x{:x})", self.pos)
    }
}

/// Location and value of the access flags of a decoded entry, detached from the buffer borrow so
/// it can be handed to a [`Declassifier`](crate::Declassifier) once decoding is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessFlagsSite {
    pub(crate) offset: usize,
    pub(crate) access_flags: u32,
    pub(crate) kind: MemberKind,
}

impl AccessFlagsSite {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn access_flags(&self) -> u32 {
        self.access_flags
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }
}

/// One entry kind of the class data stream.
pub trait ClassDataItem: Copy {
    /// Decodes the entry at the cursor, adds its delta to the running index and moves the cursor
    /// past it.
    fn decode_next(&mut self);

    /// Starts the second section of the entry kind: the running index restarts at zero.
    fn next_section(&mut self);
}

#[derive(Clone, Copy)]
struct BaseItem<'a> {
    cursor: ClassDataCursor<'a>,
    index: u32,
    access_flags: u32,
    flags_offset: usize,
}

impl<'a> BaseItem<'a> {
    fn new(cursor: ClassDataCursor<'a>) -> Self {
        Self {
            cursor,
            index: 0,
            access_flags: 0,
            flags_offset: 0,
        }
    }

    #[inline]
    fn decode_index_and_flags(&mut self) {
        let (delta, cursor) = self.cursor.read_uleb128();
        self.index = self.index.wrapping_add(delta);
        self.flags_offset = cursor.offset();
        let (access_flags, cursor) = cursor.read_uleb128();
        self.access_flags = access_flags;
        self.cursor = cursor;
    }

    fn site(&self, kind: MemberKind) -> AccessFlagsSite {
        AccessFlagsSite {
            offset: self.flags_offset,
            access_flags: self.access_flags,
            kind,
        }
    }
}

/// An `encoded_field` entry.
#[derive(Clone, Copy)]
pub struct Field<'a> {
    base: BaseItem<'a>,
    is_static: bool,
}

impl<'a> Field<'a> {
    fn new(cursor: ClassDataCursor<'a>) -> Self {
        Self {
            base: BaseItem::new(cursor),
            is_static: true,
        }
    }

    /// Index into the `field_ids` table.
    pub fn index(&self) -> u32 {
        self.base.index
    }

    /// The access flags as stored, hidden-API bits included.
    pub fn access_flags(&self) -> u32 {
        self.base.access_flags
    }

    pub fn flags(&self) -> AccessFlags {
        AccessFlags::from_bits_truncate(DexHiddenApi::remove(self.base.access_flags))
    }

    pub fn hidden_api_list(&self) -> ApiList {
        DexHiddenApi::decode(self.base.access_flags)
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn access_flags_site(&self) -> AccessFlagsSite {
        self.base.site(MemberKind::Field)
    }

    /// Cursor just past this entry.
    pub fn cursor(&self) -> ClassDataCursor<'a> {
        self.base.cursor
    }
}

impl ClassDataItem for Field<'_> {
    #[inline]
    fn decode_next(&mut self) {
        self.base.decode_index_and_flags();
    }

    fn next_section(&mut self) {
        self.is_static = false;
        self.base.index = 0;
    }
}

impl fmt::Debug for Field<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("index", &self.index())
            .field("access_flags", &format_args!("0x{:x}", self.access_flags()))
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// An `encoded_method` entry.
#[derive(Clone, Copy)]
pub struct Method<'a> {
    base: BaseItem<'a>,
    code_off: u32,
    is_static_or_direct: bool,
}

impl<'a> Method<'a> {
    fn new(cursor: ClassDataCursor<'a>) -> Self {
        Self {
            base: BaseItem::new(cursor),
            code_off: 0,
            is_static_or_direct: true,
        }
    }

    /// Index into the `method_ids` table.
    pub fn index(&self) -> u32 {
        self.base.index
    }

    /// The access flags as stored, hidden-API bits included.
    pub fn access_flags(&self) -> u32 {
        self.base.access_flags
    }

    pub fn flags(&self) -> AccessFlags {
        AccessFlags::from_bits_truncate(DexHiddenApi::remove(self.base.access_flags))
    }

    pub fn hidden_api_list(&self) -> ApiList {
        DexHiddenApi::decode(self.base.access_flags)
    }

    /// `true` for direct methods, `false` for virtual ones.
    pub fn is_static_or_direct(&self) -> bool {
        self.is_static_or_direct
    }

    /// Offset of the method's code item, zero for abstract and native methods.
    pub fn code_item_offset(&self) -> u32 {
        self.code_off
    }

    pub fn code_item(&self) -> Result<Option<CodeItem<'a>>> {
        CodeItem::parse_at(self.base.cursor.data(), self.code_off)
    }

    /// The instruction stream in 16-bit code units; empty when the method has no code.
    pub fn instructions(&self) -> Result<impl Iterator<Item = u16> + 'a> {
        Ok(self
            .code_item()?
            .into_iter()
            .flat_map(|code_item| code_item.code_units()))
    }

    pub fn access_flags_site(&self) -> AccessFlagsSite {
        self.base.site(MemberKind::Method)
    }

    /// Cursor just past this entry.
    pub fn cursor(&self) -> ClassDataCursor<'a> {
        self.base.cursor
    }
}

impl ClassDataItem for Method<'_> {
    #[inline]
    fn decode_next(&mut self) {
        self.base.decode_index_and_flags();
        let (code_off, cursor) = self.base.cursor.read_uleb128();
        self.code_off = code_off;
        self.base.cursor = cursor;
    }

    fn next_section(&mut self) {
        self.is_static_or_direct = false;
        self.base.index = 0;
    }
}

impl fmt::Debug for Method<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("index", &self.index())
            .field("access_flags", &format_args!("0x{:x}", self.access_flags()))
            .field("code_off", &format_args!("0x{:x}", self.code_off))
            .field("is_static_or_direct", &self.is_static_or_direct)
            .finish()
    }
}

/// A lazy run over the first `end` entries of a field or method group.
///
/// `partition` is the size of the group's first section; the running index restarts when the
/// iterator crosses it. Cloning takes an independent snapshot.
#[derive(Clone)]
pub struct Members<D> {
    item: D,
    position: u32,
    partition: u32,
    end: u32,
}

impl<D: ClassDataItem> Members<D> {
    fn new(item: D, partition: u32, end: u32) -> Self {
        Self {
            item,
            position: 0,
            partition,
            end,
        }
    }

    /// Decodes and drops the next `count` entries. Entries have no fixed size, so there is no
    /// faster way to get past them.
    pub fn skip_members(mut self, count: u32) -> Self {
        for _ in 0..count {
            if self.next().is_none() {
                break;
            }
        }
        self
    }

    /// Number of entries already decoded.
    pub fn position(&self) -> u32 {
        self.position
    }
}

impl<D: ClassDataItem> Iterator for Members<D> {
    type Item = D;

    #[inline]
    fn next(&mut self) -> Option<D> {
        if self.position >= self.end {
            return None;
        }

        if self.position == self.partition {
            self.item.next_section();
        }
        self.item.decode_next();
        self.position += 1;

        Some(self.item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.position) as usize;
        (remaining, Some(remaining))
    }
}

impl<D: ClassDataItem> ExactSizeIterator for Members<D> {}

impl<D: ClassDataItem> FusedIterator for Members<D> {}

impl<D> fmt::Debug for Members<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Members")
            .field("position", &self.position)
            .field("partition", &self.partition)
            .field("end", &self.end)
            .finish()
    }
}

/// Receives every entry of a class in stream order. Every method defaults to doing nothing.
pub trait ClassDataVisitor<'a> {
    fn visit_static_field(&mut self, _field: &Field<'a>) {}

    fn visit_instance_field(&mut self, _field: &Field<'a>) {}

    fn visit_direct_method(&mut self, _method: &Method<'a>) {}

    fn visit_virtual_method(&mut self, _method: &Method<'a>) {}
}

struct FnVisitor<SF, IF, DM, VM>(SF, IF, DM, VM);

impl<'a, SF, IF, DM, VM> ClassDataVisitor<'a> for FnVisitor<SF, IF, DM, VM>
where
    SF: FnMut(&Field<'a>),
    IF: FnMut(&Field<'a>),
    DM: FnMut(&Method<'a>),
    VM: FnMut(&Method<'a>),
{
    fn visit_static_field(&mut self, field: &Field<'a>) {
        (self.0)(field)
    }

    fn visit_instance_field(&mut self, field: &Field<'a>) {
        (self.1)(field)
    }

    fn visit_direct_method(&mut self, method: &Method<'a>) {
        (self.2)(method)
    }

    fn visit_virtual_method(&mut self, method: &Method<'a>) {
        (self.3)(method)
    }
}

#[inline]
fn visit_members<D: ClassDataItem>(count: u32, item: &mut D, mut visit: impl FnMut(&D)) {
    for _ in 0..count {
        item.decode_next();
        visit(item);
    }
}

/// The fields and methods of one class.
///
/// Construction decodes the four counts and nothing else; every traversal decodes the stream again
/// from the start.
pub struct ClassAccessor<'a, T> {
    dex_file: &'a DexFile<T>,
    class_def_index: u32,
    class_def: ClassDef,
    cursor: Option<ClassDataCursor<'a>>,
    num_static_fields: u32,
    num_instance_fields: u32,
    num_direct_methods: u32,
    num_virtual_methods: u32,
}

impl<'a, T: AsRef<[u8]>> ClassAccessor<'a, T> {
    pub fn new(dex_file: &'a DexFile<T>, class_def_index: u32, class_def: ClassDef) -> Self {
        let mut counts = [0u32; 4];
        let cursor = dex_file.class_data_offset(&class_def).map(|offset| {
            let mut cursor = ClassDataCursor::new(dex_file.data(), offset);
            for count in &mut counts {
                (*count, cursor) = cursor.read_uleb128();
            }
            cursor
        });
        let [num_static_fields, num_instance_fields, num_direct_methods, num_virtual_methods] =
            counts;

        Self {
            dex_file,
            class_def_index,
            class_def,
            cursor,
            num_static_fields,
            num_instance_fields,
            num_direct_methods,
            num_virtual_methods,
        }
    }

    pub fn dex_file(&self) -> &'a DexFile<T> {
        self.dex_file
    }

    pub fn class_def_index(&self) -> u32 {
        self.class_def_index
    }

    pub fn class_def(&self) -> &ClassDef {
        &self.class_def
    }

    pub fn class_idx(&self) -> u16 {
        self.class_def.class_idx
    }

    pub fn descriptor(&self) -> Result<&'a str> {
        self.dex_file
            .string_by_type_idx(self.class_def.class_idx as u32)
    }

    pub fn has_class_data(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn num_static_fields(&self) -> u32 {
        self.num_static_fields
    }

    pub fn num_instance_fields(&self) -> u32 {
        self.num_instance_fields
    }

    pub fn num_direct_methods(&self) -> u32 {
        self.num_direct_methods
    }

    pub fn num_virtual_methods(&self) -> u32 {
        self.num_virtual_methods
    }

    pub fn num_fields(&self) -> u32 {
        self.num_static_fields.wrapping_add(self.num_instance_fields)
    }

    pub fn num_methods(&self) -> u32 {
        self.num_direct_methods.wrapping_add(self.num_virtual_methods)
    }

    pub fn code_item(&self, method: &Method<'a>) -> Result<Option<CodeItem<'a>>> {
        self.dex_file.code_item(method.code_item_offset())
    }

    /// Decodes every entry in stream order and hands it to `visitor`.
    ///
    /// Returns the offset just past the class data stream, or `None` if the class has none.
    pub fn accept<V: ClassDataVisitor<'a>>(&self, visitor: &mut V) -> Option<usize> {
        let cursor = self.cursor?;

        let mut field = Field::new(cursor);
        visit_members(self.num_static_fields, &mut field, |f| {
            visitor.visit_static_field(f)
        });
        field.next_section();
        visit_members(self.num_instance_fields, &mut field, |f| {
            visitor.visit_instance_field(f)
        });

        let mut method = Method::new(field.cursor());
        visit_members(self.num_direct_methods, &mut method, |m| {
            visitor.visit_direct_method(m)
        });
        method.next_section();
        visit_members(self.num_virtual_methods, &mut method, |m| {
            visitor.visit_virtual_method(m)
        });

        Some(method.cursor().offset())
    }

    pub fn visit_fields_and_methods(
        &self,
        static_field_visitor: impl FnMut(&Field<'a>),
        instance_field_visitor: impl FnMut(&Field<'a>),
        direct_method_visitor: impl FnMut(&Method<'a>),
        virtual_method_visitor: impl FnMut(&Method<'a>),
    ) -> Option<usize> {
        self.accept(&mut FnVisitor(
            static_field_visitor,
            instance_field_visitor,
            direct_method_visitor,
            virtual_method_visitor,
        ))
    }

    pub fn visit_fields(
        &self,
        static_field_visitor: impl FnMut(&Field<'a>),
        instance_field_visitor: impl FnMut(&Field<'a>),
    ) -> Option<usize> {
        self.visit_fields_and_methods(
            static_field_visitor,
            instance_field_visitor,
            |_| {},
            |_| {},
        )
    }

    pub fn visit_methods(
        &self,
        direct_method_visitor: impl FnMut(&Method<'a>),
        virtual_method_visitor: impl FnMut(&Method<'a>),
    ) -> Option<usize> {
        self.visit_fields_and_methods(
            |_| {},
            |_| {},
            direct_method_visitor,
            virtual_method_visitor,
        )
    }

    /// Static fields followed by instance fields.
    pub fn fields(&self) -> Members<Field<'a>> {
        self.fields_internal(self.num_fields())
    }

    pub fn static_fields(&self) -> Members<Field<'a>> {
        self.fields_internal(self.num_static_fields)
    }

    /// Decodes all static fields before yielding the first instance field.
    pub fn instance_fields(&self) -> Members<Field<'a>> {
        self.fields().skip_members(self.num_static_fields)
    }

    /// Direct methods followed by virtual methods. Decodes all fields first.
    pub fn methods(&self) -> Members<Method<'a>> {
        self.methods_internal(self.num_methods())
    }

    pub fn direct_methods(&self) -> Members<Method<'a>> {
        self.methods_internal(self.num_direct_methods)
    }

    /// Decodes all fields and direct methods before yielding the first virtual method.
    pub fn virtual_methods(&self) -> Members<Method<'a>> {
        self.methods().skip_members(self.num_direct_methods)
    }

    fn fields_internal(&self, count: u32) -> Members<Field<'a>> {
        Members::new(Field::new(self.start()), self.num_static_fields, count)
    }

    fn methods_internal(&self, count: u32) -> Members<Method<'a>> {
        let mut field = Field::new(self.start());
        visit_members(self.num_fields(), &mut field, |_| {});

        Members::new(Method::new(field.cursor()), self.num_direct_methods, count)
    }

    fn start(&self) -> ClassDataCursor<'a> {
        self.cursor.unwrap_or_else(ClassDataCursor::empty)
    }
}

impl<T> fmt::Debug for ClassAccessor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassAccessor")
            .field("class_def_index", &self.class_def_index)
            .field("class_idx", &self.class_def.class_idx)
            .field("cursor", &self.cursor)
            .field("num_static_fields", &self.num_static_fields)
            .field("num_instance_fields", &self.num_instance_fields)
            .field("num_direct_methods", &self.num_direct_methods)
            .field("num_virtual_methods", &self.num_virtual_methods)
            .finish()
    }
}
