//! Identifiers for commands and queries sent to the application

use std::fmt;

/// Unique name of a command type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(&'static str);

impl CommandId {
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Unique name of a query type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(&'static str);

impl QueryId {
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
