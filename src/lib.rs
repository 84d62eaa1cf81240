pub use dexdata_dex_file as dex_file;
