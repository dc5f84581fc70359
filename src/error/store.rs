use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to open config store: {source}")]
    Open {
        #[source]
        source: tokio_rusqlite::Error,
    },
    #[error("Failed to initialize store schema: {source}")]
    Schema {
        #[source]
        source: tokio_rusqlite::Error,
    },
    #[error("Store error during {context}: {source}")]
    Query {
        context: &'static str,
        #[source]
        source: tokio_rusqlite::Error,
    },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
}
