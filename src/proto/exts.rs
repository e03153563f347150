//! Protocol buffer type extensions
//!
//! Message validation and conversions between wire messages and the domain
//! [`Endpoint`](crate::Endpoint) / [`EndpointSet`](crate::EndpointSet).

use std::fmt;

use super::v1;

/// A wire message that failed its field rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Message type name, e.g. `Endpoint`
    pub message: &'static str,
    pub field: String,
    pub reason: String,
    /// Failure of an embedded message
    pub cause: Option<Box<ValidationError>>,
}

impl ValidationError {
    fn new(
        message: &'static str,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            message,
            field: field.into(),
            reason: reason.into(),
            cause: None,
        }
    }

    fn caused_by(
        mut self,
        cause: ValidationError,
    ) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "invalid {}.{}: {}", self.message, self.field, self.reason)?;
        if let Some(cause) = &self.cause {
            write!(f, " | caused by: {cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn std::error::Error + 'static))
    }
}

impl From<ValidationError> for tonic::Status {
    fn from(err: ValidationError) -> Self {
        tonic::Status::invalid_argument(err.to_string())
    }
}

/// Field rules of a wire message
pub trait Validate {
    /// Returns the first rule violation, if any
    fn validate(&self) -> Result<(), ValidationError>;
}

// No field rules: hostname, port and weight are accepted as sent. The port
// range is enforced when converting into the domain type.
impl Validate for v1::Endpoint {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

// No field rules; target syntax belongs to the resolver.
impl Validate for v1::WatchRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl Validate for v1::WatchResponse {
    fn validate(&self) -> Result<(), ValidationError> {
        for (idx, endpoint) in self.endpoints.iter().enumerate() {
            endpoint.validate().map_err(|cause| {
                ValidationError::new(
                    "WatchResponse",
                    format!("endpoints[{idx}]"),
                    "embedded message failed validation",
                )
                .caused_by(cause)
            })?;
        }
        Ok(())
    }
}

impl From<&crate::Endpoint> for v1::Endpoint {
    fn from(endpoint: &crate::Endpoint) -> Self {
        Self {
            hostname: endpoint.hostname.clone(),
            port: u32::from(endpoint.port),
            weight: endpoint.weight,
        }
    }
}

impl TryFrom<v1::Endpoint> for crate::Endpoint {
    type Error = ValidationError;

    fn try_from(endpoint: v1::Endpoint) -> Result<Self, Self::Error> {
        endpoint.validate()?;
        let port = u16::try_from(endpoint.port).map_err(|_| {
            ValidationError::new(
                "Endpoint",
                "port",
                format!("value must be less than or equal to {}", u16::MAX),
            )
        })?;
        Ok(crate::Endpoint::new(endpoint.hostname, port, endpoint.weight))
    }
}

impl From<&crate::EndpointSet> for v1::WatchResponse {
    fn from(set: &crate::EndpointSet) -> Self {
        Self {
            endpoints: set.members().iter().map(v1::Endpoint::from).collect(),
        }
    }
}

impl v1::WatchResponse {
    /// Converts every endpoint back to the domain type, in message order
    pub fn into_endpoints(self) -> Result<Vec<crate::Endpoint>, ValidationError> {
        self.validate()?;
        self.endpoints.into_iter().map(crate::Endpoint::try_from).collect()
    }
}
