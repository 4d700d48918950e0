pub mod generate;
pub mod translate;
