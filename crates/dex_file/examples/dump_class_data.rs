use std::{env, fs::File, path::PathBuf};

use dexdata_dex_file::{ClassAccessor, DexFile};
use memmap::Mmap;

fn main() {
    pretty_env_logger::init();

    let path = env::args()
        .nth(1)
        .or_else(|| env::var("DEX_FILE").ok())
        .map(PathBuf::from)
        .expect("usage: dump_class_data <classes.dex> (or set DEX_FILE)");
    let file = File::open(path).unwrap();
    let mmap = unsafe { Mmap::map(&file).unwrap() };

    let dex = DexFile::parse(&mmap[..]).unwrap();

    println!("Header:");
    print!("{}", dex.header());
    println!();

    for accessor in dex.class_accessors() {
        let accessor = match accessor {
            Ok(accessor) => accessor,
            Err(e) => {
                log::warn!("Skipping class: {}", e);
                continue;
            }
        };
        dump_class(&accessor);
    }
}

fn dump_class(accessor: &ClassAccessor<&[u8]>) {
    println!(
        "Class: {}",
        accessor.descriptor().unwrap_or("<invalid descriptor>")
    );
    if !accessor.has_class_data() {
        return;
    }

    accessor.visit_fields_and_methods(
        |f| println!("    static field   #{:<6} {:?}", f.index(), f.flags()),
        |f| println!("    instance field #{:<6} {:?}", f.index(), f.flags()),
        |m| {
            println!(
                "    direct method  #{:<6} {:?} code@0x{:x}",
                m.index(),
                m.flags(),
                m.code_item_offset()
            )
        },
        |m| {
            println!(
                "    virtual method #{:<6} {:?} code@0x{:x}",
                m.index(),
                m.flags(),
                m.code_item_offset()
            )
        },
    );
}
