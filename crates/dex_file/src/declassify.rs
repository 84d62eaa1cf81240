use log::trace;

use crate::{
    class_accessor::AccessFlagsSite,
    hiddenapi::{DexHiddenApi, UnhideAccessFlags},
    leb128,
};

/// Write access to the access flags of class data entries.
///
/// Obtained from a [`DexFile`](crate::DexFile) with mutable storage, which it borrows exclusively:
/// no entry can be decoded while a `Declassifier` is alive. Sites are therefore collected from
/// decoded entries first and patched afterwards.
pub struct Declassifier<'a, U = DexHiddenApi> {
    data: &'a mut [u8],
    unhider: U,
}

impl<'a, U: UnhideAccessFlags> Declassifier<'a, U> {
    pub(crate) fn new(data: &'a mut [u8], unhider: U) -> Self {
        Self { data, unhider }
    }

    /// Rewrites the flags at `site` without their hidden-API bits, keeping the encoded length.
    ///
    /// Returns `false` if the flags carried no hidden-API bits, in which case nothing is written.
    ///
    /// # Panics
    ///
    /// Panics if the unhidden flags need a longer encoding than the stored ones, which a
    /// conforming [`UnhideAccessFlags`] never produces.
    pub fn unhide_access_flags(&mut self, site: AccessFlagsSite) -> bool {
        let unhidden = self.unhider.unhide(site.access_flags, site.kind);
        if unhidden == site.access_flags {
            return false;
        }

        debug_assert_eq!(
            leb128::decode_unsigned_leb128(self.data, site.offset).0,
            site.access_flags,
            "access flags site 0x{:x} does not belong to this buffer",
            site.offset
        );

        let len = leb128::update_unsigned_leb128(self.data, site.offset, unhidden);
        trace!(
            "Unhid {:?} at 0x{:x}: 0x{:x} -> 0x{:x} ({} byte(s))",
            site.kind,
            site.offset,
            site.access_flags,
            unhidden,
            len
        );

        true
    }
}
