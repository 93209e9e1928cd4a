//! Where a data set comes from.

use super::DataSet;
use crate::error::{DataError, DataResult};
use std::path::{Path, PathBuf};

const INITIAL_DATA_JSON: &str = include_str!("../../data/init_data.json");

/// Producer of a `DataSet`.
pub trait DataSource {
    fn data_set(&self) -> DataResult<DataSet>;

    /// Short description for log records.
    fn name(&self) -> String;
}

/// JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonDataSource {
    path: PathBuf,
}

impl JsonDataSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DataSource for JsonDataSource {
    fn data_set(&self) -> DataResult<DataSet> {
        let raw = std::fs::read_to_string(&self.path).map_err(|err| {
            DataError::DataLoad(format!(
                "failed to read data file `{}`: {err}",
                self.path.display()
            ))
        })?;
        DataSet::from_json_str(&raw)
    }

    fn name(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// Data set built in code.
#[derive(Debug, Clone, Default)]
pub struct StaticDataSource(pub DataSet);

impl DataSource for StaticDataSource {
    fn data_set(&self) -> DataResult<DataSet> {
        Ok(self.0.clone())
    }

    fn name(&self) -> String {
        "static".to_string()
    }
}

/// Built-in initial data: root, service and sample users with scopes and
/// tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitialDataSource;

impl DataSource for InitialDataSource {
    fn data_set(&self) -> DataResult<DataSet> {
        DataSet::from_json_str(INITIAL_DATA_JSON)
    }

    fn name(&self) -> String {
        "initial".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{DataSource, InitialDataSource, JsonDataSource};
    use crate::error::DataError;
    use crate::model::user::UserRole;

    #[test]
    fn initial_data_parses_and_has_one_root_and_service_user() {
        let data_set = InitialDataSource.data_set().unwrap();
        let roles: Vec<UserRole> = data_set.users.iter().map(|user| user.role).collect();
        assert_eq!(roles.iter().filter(|role| **role == UserRole::Root).count(), 1);
        assert_eq!(
            roles.iter().filter(|role| **role == UserRole::Service).count(),
            1
        );
        assert!(!data_set.api_scopes.is_empty());
    }

    #[test]
    fn missing_json_file_is_a_data_load_error() {
        let source = JsonDataSource::new("/definitely/not/here.json");
        assert!(matches!(source.data_set(), Err(DataError::DataLoad(_))));
    }
}
