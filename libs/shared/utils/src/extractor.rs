use axum::{body::Body, http::Request, middleware::Next, response::Response};
use uuid::Uuid;

use shared_models::auth::{CallerIdentity, CallerRole};
use shared_models::error::AppError;

pub const CALLER_ID_HEADER: &str = "x-caller-id";
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";

/// Reads the identity the upstream auth layer attached to the request and
/// stores it in the request extensions. Verification happens upstream.
pub async fn identity_middleware(mut request: Request<Body>, next: Next) -> Result<Response, AppError> {
    let identity = extract_identity(&request)?;

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

pub fn extract_identity<B>(request: &Request<B>) -> Result<CallerIdentity, AppError> {
    let headers = request.headers();

    let id = headers
        .get(CALLER_ID_HEADER)
        .ok_or_else(|| AppError::Auth("Missing caller identity".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid caller identity header".to_string()))?;

    let id = Uuid::parse_str(id.trim()).map_err(|_| AppError::Auth("Caller id is not a UUID".to_string()))?;

    let role = headers
        .get(CALLER_ROLE_HEADER)
        .ok_or_else(|| AppError::Auth("Missing caller role".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid caller role header".to_string()))?
        .parse::<CallerRole>()
        .map_err(AppError::Auth)?;

    Ok(CallerIdentity::new(id, role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request_with(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn parses_identity_headers() {
        let id = Uuid::new_v4();
        let request = request_with(&[(CALLER_ID_HEADER, &id.to_string()), (CALLER_ROLE_HEADER, "doctor")]);

        let identity = extract_identity(&request).unwrap();
        assert_eq!(identity.id, id);
        assert_eq!(identity.role, CallerRole::Provider);
    }

    #[test]
    fn missing_or_malformed_identity_is_rejected() {
        assert_matches!(extract_identity(&request_with(&[])), Err(AppError::Auth(_)));
        assert_matches!(
            extract_identity(&request_with(&[(CALLER_ID_HEADER, "nope"), (CALLER_ROLE_HEADER, "admin")])),
            Err(AppError::Auth(_))
        );
        assert_matches!(
            extract_identity(&request_with(&[
                (CALLER_ID_HEADER, &Uuid::new_v4().to_string()),
                (CALLER_ROLE_HEADER, "janitor")
            ])),
            Err(AppError::Auth(_))
        );
    }
}
