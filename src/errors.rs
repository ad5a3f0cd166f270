//! Error utilities

/// Describes error reason
#[non_exhaustive]
#[derive(Debug, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Conflict,
    AlreadyExists,
    /// Catch-all variant. Since this enum is non-exhaustive,
    /// it should be handled with `_` pattern
    Unknown,
}

/// Tries to classify k8s error
pub fn classify(error_reason: &str) -> ErrorClass {
    match error_reason {
        "NotFound" => ErrorClass::NotFound,
        "Conflict" => ErrorClass::Conflict,
        "AlreadyExists" => ErrorClass::AlreadyExists,
        _ => ErrorClass::Unknown,
    }
}

/// Tries to classify k8s error, wrapped in kube Error.
/// Falls back to the HTTP status code when the reason is not recognized.
pub fn classify_kube(error: &kube::Error) -> ErrorClass {
    match error {
        kube::Error::Api(api) => match classify(&api.reason) {
            ErrorClass::Unknown => match api.code {
                404 => ErrorClass::NotFound,
                409 => ErrorClass::Conflict,
                _ => ErrorClass::Unknown,
            },
            class => class,
        },
        _ => ErrorClass::Unknown,
    }
}

pub fn is_not_found(error: &kube::Error) -> bool {
    classify_kube(error) == ErrorClass::NotFound
}

/// Builds the error the API server returns for a missing object.
pub fn not_found(kind: &str, name: &str) -> kube::Error {
    kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} \"{}\" not found", kind, name),
        reason: "NotFound".to_string(),
        code: 404,
    })
}
