pub mod extract_caller;

pub use extract_caller::extract_caller;
