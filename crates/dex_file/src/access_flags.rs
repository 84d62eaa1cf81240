// https://source.android.com/docs/core/runtime/dex-format#access-flags

use bitflags::bitflags;

bitflags! {
    /// Access flags of a class, field or method. Several bits carry a different meaning depending
    /// on the kind of member they are attached to.
    pub struct AccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const CONSTRUCTOR = 0x1_0000;
        const DECLARED_SYNCHRONIZED = 0x2_0000;

        const VISIBILITY = Self::PUBLIC.bits | Self::PRIVATE.bits | Self::PROTECTED.bits;
    }
}
