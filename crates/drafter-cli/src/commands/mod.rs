pub mod generate;
pub mod prompt;
pub mod search;
pub mod utils;
