mod content;
mod envelope;
mod error;
mod plan;
mod row;
mod traits;

pub use content::*;
pub use envelope::*;
pub use error::*;
pub use plan::*;
pub use row::*;
pub use traits::*;
