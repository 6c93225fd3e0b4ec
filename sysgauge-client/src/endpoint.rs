use http::Uri;

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid origin URL: {0}")]
    InvalidOrigin(#[from] http::uri::InvalidUri),
    #[error("origin URL has no host")]
    MissingHost,
    #[error("unsupported origin scheme: {0}")]
    UnsupportedScheme(String),
    #[error("failed to assemble endpoint URL: {0}")]
    Assemble(#[from] http::Error),
}

/// Turns an http(s) origin into the websocket URL of one realtime path.
///
/// The scheme is upgraded http→ws / https→wss and any path on the
/// origin is replaced by `path`.
pub fn endpoint_url(origin: &str, path: &str) -> Result<Uri, EndpointError> {
    let origin: Uri = origin.parse()?;

    let scheme = match origin.scheme_str() {
        Some("http") => "ws",
        Some("https") => "wss",
        other => {
            return Err(EndpointError::UnsupportedScheme(
                other.unwrap_or("<none>").to_owned(),
            ));
        }
    };
    let authority = origin.authority().ok_or(EndpointError::MissingHost)?.clone();

    let url = Uri::builder()
        .scheme(scheme)
        .authority(authority)
        .path_and_query(path)
        .build()?;

    Ok(url)
}
