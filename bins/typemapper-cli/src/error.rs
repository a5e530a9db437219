use typemapper::MappingError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Mapping(#[from] MappingError),

    #[error("input ({path}): {detail}")]
    Input { path: String, detail: String },

    #[error("input line {line}: {detail}")]
    Parse { line: usize, detail: String },

    #[error("output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
