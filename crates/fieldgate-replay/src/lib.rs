mod csv_loader;
mod feeder;

pub use csv_loader::load_rows;
pub use feeder::{IndexPolicy, ScheduledFeeder};
