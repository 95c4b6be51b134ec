use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AssemblyError {
    #[error("Syntax Error: {0}")]
    PestError(#[from] pest::error::Error<crate::lexer::Rule>),

    #[error("Assembly failed with {errors} errors, {warnings} warnings")]
    Failed { errors: usize, warnings: usize },
}
