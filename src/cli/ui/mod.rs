mod operator;
mod output;

pub use operator::ConsoleOperator;
pub use output::Output;
