//! Query string for the lookup endpoint.

use ipgeo_core::ClientConfig;

/// Build the `&`-joined query for `config`.
///
/// Parameters appear in the order `apiKey`, `ip`, `fields`, `excludes`,
/// `lang`, `include`, and only when set. Values are emitted verbatim.
pub fn build_geolocation_url_params(config: &ClientConfig) -> String {
    let mut params = Vec::new();

    if let Some(api_key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
        params.push(format!("apiKey={}", api_key));
    }
    if !config.ip_address.is_empty() {
        params.push(format!("ip={}", config.ip_address));
    }
    if !config.fields.is_empty() {
        params.push(format!("fields={}", config.fields));
    }
    if !config.excludes.is_empty() {
        params.push(format!("excludes={}", config.excludes));
    }
    if !config.lang.is_empty() {
        params.push(format!("lang={}", config.lang));
    }

    let includes = config.include_tokens();
    if !includes.is_empty() {
        params.push(format!("include={}", includes.join(",")));
    }

    params.join("&")
}
