//! Decides from a failure value whether the failed operation is worth another attempt.
//!
//! The same predicates apply to failures coming from the REST clients and to failures coming
//! from the CLI subprocess, both expose what the remote side answered through [Classify].

/// Application error code returned by the Kafka management API when no cluster has room
/// for a new instance.
pub const CLUSTER_CAPACITY_EXHAUSTED_CODE: &str = "KAFKAS-MGMT-24";

const HTTP_FORBIDDEN: u16 = 403;
const HTTP_REQUEST_TIMEOUT: u16 = 408;

/// Exposes what a failure says about the remote side.
pub trait Classify {
    /// HTTP-like status code returned by the remote system, if any.
    fn status_code(&self) -> Option<u16>;

    /// Application level error code (e.g. `KAFKAS-MGMT-24`), if any.
    fn error_code(&self) -> Option<&str>;

    /// True for failures that never reached the remote system (connection reset, dns, ...).
    fn is_transport(&self) -> bool {
        false
    }
}

pub fn is_server_error<E: Classify>(err: &E) -> bool {
    err.status_code()
        .is_some_and(|code| (500..600).contains(&code))
}

/// Classifier used around direct API calls: server errors, request timeouts and transport
/// failures are transient.
pub fn is_retryable<E: Classify>(err: &E) -> bool {
    is_server_error(err) || err.status_code() == Some(HTTP_REQUEST_TIMEOUT) || err.is_transport()
}

pub fn is_capacity_exhausted<E: Classify>(err: &E) -> bool {
    err.status_code() == Some(HTTP_FORBIDDEN)
        && err.error_code() == Some(CLUSTER_CAPACITY_EXHAUSTED_CODE)
}

/// Classifier used while creating a Kafka instance: waits for capacity and tolerates server errors.
pub fn is_retryable_creation<E: Classify>(err: &E) -> bool {
    is_capacity_exhausted(err) || is_server_error(err)
}
