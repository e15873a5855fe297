//! This module defines the core data structures used across the search index client.

pub mod mapping;
pub mod operation;
pub mod request;
pub mod search_query;
pub mod search_result;
