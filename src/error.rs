//! Error types reported by `ChainTable` operations.

use std::error::Error;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableError {
    #[error("allocation of the bucket array failed")]
    OutOfMemory,
    #[error("key is already present in the table")]
    KeyExists,
    #[error("key is not present in the table")]
    NotFound,
    #[error("table is locked by an active walk")]
    Locked,
}

/// A refused insert or upsert. The value the caller tried to store is handed
/// back untouched.
pub struct Rejected<V> {
    error: TableError,
    value: V,
}

impl<V> Rejected<V> {
    pub(crate) fn new(error: TableError, value: V) -> Self {
        Self { error, value }
    }

    pub fn error(&self) -> TableError {
        self.error
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn into_parts(self) -> (TableError, V) {
        (self.error, self.value)
    }
}

impl<V> fmt::Debug for Rejected<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<V> fmt::Display for Rejected<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value rejected: {}", self.error)
    }
}

impl<V> Error for Rejected<V> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

impl<V> From<Rejected<V>> for TableError {
    fn from(r: Rejected<V>) -> Self {
        r.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_returns_value_and_error() {
        let r = Rejected::new(TableError::KeyExists, vec![1, 2, 3]);
        assert_eq!(r.error(), TableError::KeyExists);
        assert_eq!(r.to_string(), "value rejected: key is already present in the table");
        let (e, v) = r.into_parts();
        assert_eq!(e, TableError::KeyExists);
        assert_eq!(v, vec![1, 2, 3]);
    }

    #[test]
    fn rejected_converts_with_question_mark() {
        fn op() -> Result<(), TableError> {
            Err::<(), _>(Rejected::new(TableError::Locked, 7u8))?;
            Ok(())
        }
        assert_eq!(op(), Err(TableError::Locked));
    }

    #[test]
    fn rejected_source_is_table_error() {
        let r = Rejected::new(TableError::Locked, ());
        let src = r.source().expect("source");
        assert_eq!(src.to_string(), TableError::Locked.to_string());
    }
}
