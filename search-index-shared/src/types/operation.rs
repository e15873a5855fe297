//! Names of the write operations that can be deferred.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::UnknownOperation;

/// A write against the search service that can be queued for later delivery.
///
/// Each operation has its own queue; the string form is used in queue keys and
/// job records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeferredOperation {
    /// PUT the request body at the request path.
    Index,
    /// DELETE the request path.
    Delete,
}

impl DeferredOperation {
    /// Every operation, in a stable order.
    pub const ALL: [DeferredOperation; 2] = [DeferredOperation::Index, DeferredOperation::Delete];

    /// The operation name used in queue keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeferredOperation::Index => "index",
            DeferredOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for DeferredOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeferredOperation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "index" => Ok(DeferredOperation::Index),
            "delete" => Ok(DeferredOperation::Delete),
            _ => Err(UnknownOperation(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operation_names() {
        assert_eq!("index".parse::<DeferredOperation>(), Ok(DeferredOperation::Index));
        assert_eq!(" Delete ".parse::<DeferredOperation>(), Ok(DeferredOperation::Delete));
        assert_eq!(
            "update".parse::<DeferredOperation>(),
            Err(UnknownOperation("update".to_string()))
        );
    }

    #[test]
    fn test_display_matches_queue_name() {
        for op in DeferredOperation::ALL {
            assert_eq!(op.to_string(), op.as_str());
            assert_eq!(op.as_str().parse::<DeferredOperation>(), Ok(op));
        }
    }
}
