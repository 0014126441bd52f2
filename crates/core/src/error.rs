use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DATABRICKS_HOST is not set")]
    MissingHost,

    #[error("no Databricks credentials: set DATABRICKS_TOKEN or DATABRICKS_CLIENT_ID/DATABRICKS_CLIENT_SECRET")]
    MissingCredentials,
}
