// Request URL construction.

use url::Url;

use crate::error::Error;
use crate::params::OrderedParams;

/// Join `base`, `path`, `id`, and `params` into a request URL.
///
/// Exactly one `/` separates the base from the path and the path from the
/// id. A non-empty path always ends in `/`, so the id becomes its own path
/// segment. The id itself is appended verbatim.
pub fn build_url(base: &str, path: &str, id: &str, params: &OrderedParams) -> Result<Url, Error> {
    let mut raw = String::with_capacity(base.len() + path.len() + id.len() + 1);
    raw.push_str(base);

    if !base.ends_with('/') && (!path.is_empty() || !id.is_empty()) {
        raw.push('/');
    }

    if !path.is_empty() {
        raw.push_str(path.strip_prefix('/').unwrap_or(path));
        if !raw.ends_with('/') {
            raw.push('/');
        }
    }

    raw.push_str(id);

    if !params.is_empty() {
        raw.push('?');
        raw.push_str(&params.encode());
    }

    Url::parse(&raw).map_err(|source| Error::InvalidUrl { url: raw, source })
}
