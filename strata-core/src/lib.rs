//! Core domain types for the Strata feature connector.
//!
//! These models describe what a vector datasource exposes to a renderer: a
//! layer descriptor, an advisory extent, and lazily produced features for a
//! rectangular query. Constructors return `Result` where input can be
//! invalid so that bad configuration surfaces early.

#![forbid(unsafe_code)]

mod attribute;
mod datasource;
mod feature;
mod parameters;
mod query;
mod value;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use attribute::{AttributeDescriptor, AttributeType, LayerDescriptor};
pub use datasource::{Datasource, DatasourceKind};
pub use feature::{Degradation, Feature, Featureset};
pub use parameters::{ParameterError, Parameters};
pub use query::{Query, QueryError};
pub use value::Value;
