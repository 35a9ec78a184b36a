pub mod compute;
pub mod equilibrate;
pub mod generate;
