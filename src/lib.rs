pub mod openai;
pub mod translate;
