#![allow(dead_code)]

use dexdata_dex_file::{leb128::encode_unsigned_leb128, DexFile};

const HEADER_SIZE: usize = 0x70;
const CLASS_DEF_SIZE: usize = 0x20;

pub const PUBLIC: u32 = 0x0001;
pub const PRIVATE: u32 = 0x0002;
pub const PROTECTED: u32 = 0x0004;
pub const STATIC: u32 = 0x0008;
pub const FINAL: u32 = 0x0010;
pub const NATIVE: u32 = 0x0100;
pub const ABSTRACT: u32 = 0x0400;
pub const CONSTRUCTOR: u32 = 0x1_0000;

pub struct MethodSpec {
    pub delta: u32,
    pub flags: u32,
    pub code: Option<Vec<u16>>,
}

pub fn method(delta: u32, flags: u32, code: Option<&[u16]>) -> MethodSpec {
    MethodSpec {
        delta,
        flags,
        code: code.map(<[u16]>::to_vec),
    }
}

/// Entries of a class data item, with field and method indices given as deltas.
#[derive(Default)]
pub struct ClassData {
    pub static_fields: Vec<(u32, u32)>,
    pub instance_fields: Vec<(u32, u32)>,
    pub direct_methods: Vec<MethodSpec>,
    pub virtual_methods: Vec<MethodSpec>,
}

pub struct ClassSpec {
    pub descriptor: &'static str,
    pub data: Option<ClassData>,
}

pub fn class(descriptor: &'static str, data: ClassData) -> ClassSpec {
    ClassSpec {
        descriptor,
        data: Some(data),
    }
}

pub fn class_without_data(descriptor: &'static str) -> ClassSpec {
    ClassSpec {
        descriptor,
        data: None,
    }
}

/// Lays out a minimal dex image: header, string ids, type ids and class defs, followed by the
/// string data, code items and class data items in the data section.
pub fn build_dex(classes: &[ClassSpec]) -> Vec<u8> {
    let count = classes.len();
    let string_ids_off = HEADER_SIZE;
    let type_ids_off = string_ids_off + count * 4;
    let class_defs_off = type_ids_off + count * 4;
    let data_off = class_defs_off + count * CLASS_DEF_SIZE;

    let mut out = vec![0u8; data_off];

    for (i, spec) in classes.iter().enumerate() {
        let string_data_off = out.len();
        encode_unsigned_leb128(&mut out, spec.descriptor.len() as u32);
        out.extend_from_slice(spec.descriptor.as_bytes());
        out.push(0);

        put_u32(&mut out, string_ids_off + i * 4, string_data_off as u32);
        put_u32(&mut out, type_ids_off + i * 4, i as u32);
    }

    for (i, spec) in classes.iter().enumerate() {
        let class_def_off = class_defs_off + i * CLASS_DEF_SIZE;
        put_u16(&mut out, class_def_off, i as u16);
        put_u32(&mut out, class_def_off + 4, PUBLIC);
        put_u32(&mut out, class_def_off + 12, 0);
        put_u32(&mut out, class_def_off + 16, u32::MAX);

        let Some(data) = &spec.data else {
            continue;
        };

        let direct_code = write_code_items(&mut out, &data.direct_methods);
        let virtual_code = write_code_items(&mut out, &data.virtual_methods);

        let class_data_off = out.len();
        for n in [
            data.static_fields.len(),
            data.instance_fields.len(),
            data.direct_methods.len(),
            data.virtual_methods.len(),
        ] {
            encode_unsigned_leb128(&mut out, n as u32);
        }
        for &(delta, flags) in data.static_fields.iter().chain(&data.instance_fields) {
            encode_unsigned_leb128(&mut out, delta);
            encode_unsigned_leb128(&mut out, flags);
        }
        let methods = data.direct_methods.iter().zip(direct_code).chain(
            data.virtual_methods.iter().zip(virtual_code),
        );
        for (method, code_off) in methods {
            encode_unsigned_leb128(&mut out, method.delta);
            encode_unsigned_leb128(&mut out, method.flags);
            encode_unsigned_leb128(&mut out, code_off);
        }

        put_u32(&mut out, class_def_off + 24, class_data_off as u32);
    }

    let file_size = out.len();
    out[0..8].copy_from_slice(b"dex\n035\0");
    put_u32(&mut out, 0x20, file_size as u32);
    put_u32(&mut out, 0x24, HEADER_SIZE as u32);
    put_u32(&mut out, 0x28, 0x1234_5678);
    put_u32(&mut out, 0x38, count as u32);
    put_u32(&mut out, 0x3c, string_ids_off as u32);
    put_u32(&mut out, 0x40, count as u32);
    put_u32(&mut out, 0x44, type_ids_off as u32);
    put_u32(&mut out, 0x60, count as u32);
    put_u32(&mut out, 0x64, class_defs_off as u32);
    put_u32(&mut out, 0x68, (file_size - data_off) as u32);
    put_u32(&mut out, 0x6c, data_off as u32);

    out
}

/// Offset of the `class_data_off` slot of class def `index` in an image built from `count` classes.
pub fn class_data_off_slot(count: usize, index: usize) -> usize {
    HEADER_SIZE + count * 8 + index * CLASS_DEF_SIZE + 24
}

pub fn with_dex(classes: &[ClassSpec], f: impl FnOnce(DexFile<Vec<u8>>)) {
    let _ = pretty_env_logger::try_init();

    f(DexFile::parse(build_dex(classes)).unwrap());
}

fn write_code_items(out: &mut Vec<u8>, methods: &[MethodSpec]) -> Vec<u32> {
    methods
        .iter()
        .map(|method| {
            let Some(code) = &method.code else {
                return 0;
            };

            while out.len() % 4 != 0 {
                out.push(0);
            }
            let offset = out.len();
            for value in [1u16, 1, 0, 0] {
                out.extend_from_slice(&value.to_le_bytes());
            }
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&(code.len() as u32).to_le_bytes());
            for unit in code {
                out.extend_from_slice(&unit.to_le_bytes());
            }

            offset as u32
        })
        .collect()
}

pub fn put_u32(out: &mut [u8], offset: usize, value: u32) {
    out[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u16(out: &mut [u8], offset: usize, value: u16) {
    out[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}
