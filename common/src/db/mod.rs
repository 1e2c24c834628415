pub mod design;
pub mod indices;
pub mod parser;
pub mod tech;
