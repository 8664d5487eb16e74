pub mod history;
pub mod order_line;
pub mod submission;
