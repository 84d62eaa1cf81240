//! Hidden-API restriction lists folded into the access flags of class data entries.
//!
//! Two otherwise-unused bit patterns of an entry's access flags carry the list:
//!
//! * the first bit is set when the visibility bits hold more than one of `PUBLIC`, `PRIVATE`
//!   and `PROTECTED`, and is toggled by flipping all three;
//! * the second bit is `0x20` for fields and non-native methods, and `0x200` for native methods.
//!
//! Neither encoding ever needs more LEB128 bytes when removed, so an entry can be unhidden in
//! place.

use std::convert::TryFrom;

use crate::AccessFlags;

const HIDDEN_BIT: u32 = 0x0000_0020;
const HIDDEN_BIT_NATIVE: u32 = 0x0000_0200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiList {
    Whitelist,
    LightGreylist,
    DarkGreylist,
    Blacklist,
}

impl TryFrom<u32> for ApiList {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ApiList::Whitelist),
            1 => Ok(ApiList::LightGreylist),
            2 => Ok(ApiList::DarkGreylist),
            3 => Ok(ApiList::Blacklist),
            _ => Err(value),
        }
    }
}

/// Turns the raw access flags of an entry into their public, unrestricted form.
///
/// Implementations must never return a value whose LEB128 encoding is longer than the encoding
/// of the flags they were given.
pub trait UnhideAccessFlags {
    fn unhide(&self, raw_access_flags: u32, kind: MemberKind) -> u32;
}

/// The two-bit scheme described in the module documentation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DexHiddenApi;

impl DexHiddenApi {
    pub fn decode(raw_access_flags: u32) -> ApiList {
        let flags = HiddenAccessFlags(raw_access_flags);
        let value = flags.first_bit() as u32 | (flags.second_bit() as u32) << 1;
        ApiList::try_from(value).unwrap_or(ApiList::Blacklist)
    }

    pub fn encode(raw_access_flags: u32, list: ApiList) -> u32 {
        let mut flags = HiddenAccessFlags(Self::remove(raw_access_flags));
        let value = list as u32;
        flags.set_first_bit(value & 1 != 0);
        flags.set_second_bit(value & 2 != 0);
        flags.0
    }

    pub fn remove(raw_access_flags: u32) -> u32 {
        let mut flags = HiddenAccessFlags(raw_access_flags);
        flags.set_first_bit(false);
        flags.set_second_bit(false);
        flags.0
    }
}

impl UnhideAccessFlags for DexHiddenApi {
    fn unhide(&self, raw_access_flags: u32, _kind: MemberKind) -> u32 {
        Self::remove(raw_access_flags)
    }
}

struct HiddenAccessFlags(u32);

impl HiddenAccessFlags {
    fn second_flag(&self) -> u32 {
        if self.0 & AccessFlags::NATIVE.bits() != 0 {
            HIDDEN_BIT_NATIVE
        } else {
            HIDDEN_BIT
        }
    }

    fn first_bit(&self) -> bool {
        (self.0 & AccessFlags::VISIBILITY.bits()).count_ones() > 1
    }

    fn set_first_bit(&mut self, value: bool) {
        if self.first_bit() != value {
            self.0 ^= AccessFlags::VISIBILITY.bits();
        }
    }

    fn second_bit(&self) -> bool {
        self.0 & self.second_flag() != 0
    }

    fn set_second_bit(&mut self, value: bool) {
        let flag = self.second_flag();
        if value {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }
}
