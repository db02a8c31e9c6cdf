//! HTTP middleware layers.

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::session::CLIENT_ID_HEADER;

/// Build the CORS layer from configured origins.
///
/// `*` keeps the permissive development default; anything else becomes an
/// explicit origin list.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed_methods = [Method::GET, Method::POST, Method::DELETE];
    let allowed_headers = [
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::HeaderName::from_static(CLIENT_ID_HEADER),
    ];
    let exposed_headers = [header::CONTENT_DISPOSITION, header::CONTENT_LENGTH];

    let layer = CorsLayer::new()
        .allow_methods(allowed_methods)
        .allow_headers(allowed_headers)
        .expose_headers(exposed_headers);

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
