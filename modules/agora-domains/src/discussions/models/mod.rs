pub mod discussion;
pub mod statement;
