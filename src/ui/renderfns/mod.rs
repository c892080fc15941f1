mod footer;
mod header;
mod utils;

pub use footer::draw_footer;
pub use header::{draw_header, HeaderInfo};
pub use utils::{pain_color, truncate};
