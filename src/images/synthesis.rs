//! Prompt-in-the-URL image synthesis. The service renders on first GET, so
//! building the URL is the whole request.

use rand::{Rng, rng};

/// `<endpoint>/<prompt>?width=..&height=..&nologo=true&seed=..`
pub fn prompt_url(endpoint: &str, directive: &str, width: u32, height: u32, seed: u32) -> String {
    format!(
        "{}/{}?width={width}&height={height}&nologo=true&seed={seed}",
        endpoint.trim_end_matches('/'),
        urlencoding::encode(directive.trim()),
    )
}

/// Fresh seed per call so the same directive still yields a new picture.
pub fn fresh_seed() -> u32 {
    rng().random()
}
