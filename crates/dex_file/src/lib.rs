// https://source.android.com/docs/core/runtime/dex-format

mod access_flags;
pub mod class_accessor;
mod code_item;
mod declassify;
mod dex_file;
mod error;
pub mod hiddenapi;
pub mod leb128;
mod parser;

pub use self::dex_file::{ClassDef, DexFile, Header, SectionRef};
pub use access_flags::AccessFlags;
pub use class_accessor::{
    AccessFlagsSite, ClassAccessor, ClassDataItem, ClassDataVisitor, Field, Members, Method,
};
pub use code_item::CodeItem;
pub use declassify::Declassifier;
pub use error::DexFileError;

pub type Result<T, E = DexFileError> = std::result::Result<T, E>;
