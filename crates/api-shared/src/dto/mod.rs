//! Wire types for the REST API.
//!
//! Requests carry raw values (enum fields as strings) and convert into core input
//! records with `TryFrom`, so a bad value surfaces as a `CoreError::Validation`.
//! Responses flatten the core records into plain JSON objects.

pub mod appointment;
pub mod availability;
pub mod consultation;
pub mod inbox;
pub mod payment;
pub mod provider;
pub mod review;
pub mod visit;

use std::str::FromStr;

use carebook_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub use appointment::*;
pub use availability::*;
pub use consultation::*;
pub use inbox::*;
pub use payment::*;
pub use provider::*;
pub use review::*;
pub use visit::*;

/// `page` is 1-based.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CountRes {
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
    pub details: Option<String>,
}

/// Parses an optional enum value given as text.
pub(crate) fn parse_opt<T>(value: Option<&str>) -> CoreResult<Option<T>>
where
    T: FromStr<Err = CoreError>,
{
    value.map(str::parse).transpose()
}
