pub mod file;
pub mod hexdump;
