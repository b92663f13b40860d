// Source tables: CSV loading, team codes, result writing.

pub mod loader;
pub mod output;
pub mod teams;
pub mod types;
