pub mod app;
pub mod cells;
pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod info;
pub mod output;
pub mod query;
pub mod run;
pub mod runtime;
pub mod serve;

pub use cells::{read_cell_file, split_cell_file, Cell};
pub use serve::{serve_lines, Request, Response};
