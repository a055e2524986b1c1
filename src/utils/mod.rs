/// Join a base URL and an endpoint path without doubling slashes.
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", base, endpoint)
}
