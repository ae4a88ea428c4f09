mod catalog;
mod cwd;
mod glstring;
mod input;

pub use catalog::read_catalog;
pub use cwd::read_cwd_alleles;
pub use glstring::GlStringRecords;
pub use input::open_reader;
