mod csv_handler;
mod domains;
mod utils;

pub use csv_handler::*;
pub use domains::*;
pub use utils::*;
