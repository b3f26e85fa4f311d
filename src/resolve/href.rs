/// Stands in for the server base href in stored values, so a job can be replayed after the
/// server moves to another URL
pub const SERVER_URL_TOKEN: &str = "<GenePatternURL>";

/// Replace every occurrence of the base href with [SERVER_URL_TOKEN]
pub fn replace_server_url(value: &str, base_href: &str) -> String {
    let base = base_href.trim_end_matches('/');
    if base.is_empty() || value.contains(SERVER_URL_TOKEN) {
        return value.to_string();
    }
    value.replace(base, SERVER_URL_TOKEN)
}

/// Replace every [SERVER_URL_TOKEN] with the base href
pub fn expand_server_url(value: &str, base_href: &str) -> String {
    value.replace(SERVER_URL_TOKEN, base_href.trim_end_matches('/'))
}

/// The part of a server URL after the base href, e.g. `/users/alice/a.gct`
pub fn server_relative_uri<'a>(value: &'a str, base_href: &str) -> Option<&'a str> {
    let base = base_href.trim_end_matches('/');
    let rest = value.strip_prefix(SERVER_URL_TOKEN).or_else(|| value.strip_prefix(base))?;
    rest.starts_with('/').then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://127.0.0.1:8080/gp";

    #[test]
    fn placeholder_round_trip() {
        let value = "http://127.0.0.1:8080/gp/users/alice/all_aml_test.gct";
        let stored = replace_server_url(value, BASE);
        assert_eq!(stored, "<GenePatternURL>/users/alice/all_aml_test.gct");
        assert_eq!(expand_server_url(&stored, "http://127.0.0.1:8080/gp/"), value);
    }

    #[test]
    fn other_values_are_untouched() {
        let value = "ftp://ftp.example.org/all_aml_test.gct";
        assert_eq!(replace_server_url(value, BASE), value);
        assert_eq!(expand_server_url(value, BASE), value);
    }

    #[test]
    fn relative_uri_from_token_or_base() {
        assert_eq!(server_relative_uri("<GenePatternURL>/users/a/x.txt", BASE), Some("/users/a/x.txt"));
        assert_eq!(server_relative_uri("http://127.0.0.1:8080/gp/data//x.txt", BASE), Some("/data//x.txt"));
        assert_eq!(server_relative_uri("http://127.0.0.1:8080/gpx/data//x.txt", BASE), None);
        assert_eq!(server_relative_uri("http://other/gp/data//x.txt", BASE), None);
    }
}
