use crate::config::LinkRules;
use url::Url;

/// Marks a string that already went through the redirect-macro conversion.
const MACRO_SIGNATURE: &str = "RedirectTo(concat(";

/// Tracking token the delivery platform substitutes at send time.
const TRACKING_PLACEHOLDER: &str = "@prefix";

/// Convert a user-entered link into the AMPscript redirect macro when the
/// host belongs to the configured domain, or into a resolved absolute URL
/// otherwise. Total over arbitrary input: anything unparseable comes back as
/// the trimmed input, and re-applying the function changes nothing.
pub fn normalize_href(raw: &str, rules: &LinkRules) -> String {
    let href = raw.trim();
    if href.is_empty() {
        return String::new();
    }
    if href.contains(MACRO_SIGNATURE) {
        // already converted
        return href.to_string();
    }

    let url = match resolve_url(href, rules) {
        Some(url) => url,
        None => return href.to_string(),
    };

    if host_matches(url.host_str(), &rules.link_domain) {
        let base = macro_base(&url, rules);
        let separator = if url.query().map_or(false, |q| !q.is_empty()) {
            '&'
        } else {
            '?'
        };
        format!("%%=RedirectTo(concat('{base}{separator}',{TRACKING_PLACEHOLDER}))=%%")
    } else {
        url.to_string()
    }
}

/// Resolve a possibly-relative image path to an absolute URL under the
/// configured base origin. Paths that are neither absolute nor root-relative
/// are treated as intentional and passed through.
pub fn normalize_image(raw: &str, rules: &LinkRules) -> String {
    let val = raw.trim();
    if val.is_empty() {
        return String::new();
    }
    if val.starts_with("http") {
        return val.to_string();
    }
    if val.starts_with('/') {
        return format!("{}{}", rules.base_origin, val);
    }
    val.to_string()
}

/// The always-macro href used by stack export: links on the configured domain
/// get the full normalization, and any other resolvable link is still wrapped
/// in the redirect macro because stacked fragments only ever target the
/// macro-based delivery platform.
pub fn macro_href(raw: &str, rules: &LinkRules) -> String {
    let href = raw.trim();
    if href.is_empty() || href.contains(MACRO_SIGNATURE) {
        return href.to_string();
    }
    let normalized = normalize_href(href, rules);
    if normalized.contains(MACRO_SIGNATURE) {
        return normalized;
    }
    // placeholders like "#" and other unresolvable values get no separator
    let separator = if !normalized.starts_with("http") {
        ""
    } else if normalized.contains('?') {
        "&"
    } else {
        "?"
    };
    format!("%%=RedirectTo(concat('{normalized}{separator}',{TRACKING_PLACEHOLDER}))=%%")
}

fn resolve_url(href: &str, rules: &LinkRules) -> Option<Url> {
    if href.starts_with('/') {
        let base = Url::parse(&rules.base_origin).ok()?;
        return base.join(href).ok();
    }
    let absolute = if href.starts_with("http") {
        href.to_string()
    } else {
        format!("https://{href}")
    };
    Url::parse(&absolute).ok()
}

fn host_matches(host: Option<&str>, domain: &str) -> bool {
    let Some(host) = host else { return false };
    let host = host.to_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Origin + path + query for the macro body. A bare apex host is
/// canonicalized to the configured base origin so schemeless input like
/// `sodimac.cl/promos` lands on the canonical www host; subdomains keep
/// their own origin.
fn macro_base(url: &Url, rules: &LinkRules) -> String {
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let origin = if host == rules.link_domain {
        rules.base_origin.clone()
    } else {
        url.origin().ascii_serialization()
    };
    let query = url
        .query()
        .filter(|q| !q.is_empty())
        .map(|q| format!("?{q}"))
        .unwrap_or_default();
    format!("{}{}{}", origin, url.path(), query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> LinkRules {
        LinkRules::default()
    }

    #[test]
    fn schemeless_apex_input_becomes_macro_on_www_host() {
        assert_eq!(
            normalize_href("sodimac.cl/promos", &rules()),
            "%%=RedirectTo(concat('https://www.sodimac.cl/promos?',@prefix))=%%"
        );
    }

    #[test]
    fn matching_subdomain_keeps_its_own_origin() {
        assert_eq!(
            normalize_href("https://m.sodimac.cl/app", &rules()),
            "%%=RedirectTo(concat('https://m.sodimac.cl/app?',@prefix))=%%"
        );
    }

    #[test]
    fn existing_query_switches_separator_to_ampersand() {
        assert_eq!(
            normalize_href("https://www.sodimac.cl/lista?sid=SO_HO_1", &rules()),
            "%%=RedirectTo(concat('https://www.sodimac.cl/lista?sid=SO_HO_1&',@prefix))=%%"
        );
    }

    #[test]
    fn foreign_domain_passes_through_as_absolute_url() {
        assert_eq!(
            normalize_href("https://example.com/page?a=1", &rules()),
            "https://example.com/page?a=1"
        );
    }

    #[test]
    fn root_relative_href_resolves_against_base_origin() {
        assert_eq!(
            normalize_href("/sodimac-cl/seleccion/maestro-de-la-casa", &rules()),
            "%%=RedirectTo(concat('https://www.sodimac.cl/sodimac-cl/seleccion/maestro-de-la-casa?',@prefix))=%%"
        );
    }

    #[test]
    fn empty_and_whitespace_inputs_become_empty() {
        assert_eq!(normalize_href("", &rules()), "");
        assert_eq!(normalize_href("   \t", &rules()), "");
    }

    #[test]
    fn unparseable_input_comes_back_trimmed() {
        assert_eq!(normalize_href("  not a url  ", &rules()), "not a url");
    }

    #[test]
    fn normalize_href_is_idempotent() {
        let inputs = [
            "sodimac.cl/promos",
            "https://www.sodimac.cl/lista?sid=1",
            "https://example.com/page?a=1",
            "/relative/path",
            "not a url",
            "",
            "%%=RedirectTo(concat('https://www.sodimac.cl/x?',@prefix))=%%",
        ];
        for input in inputs {
            let once = normalize_href(input, &rules());
            let twice = normalize_href(&once, &rules());
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn image_paths_normalize_per_shape() {
        assert_eq!(
            normalize_image("/img/x.png", &rules()),
            "https://www.sodimac.cl/img/x.png"
        );
        assert_eq!(normalize_image("http://cdn/x.png", &rules()), "http://cdn/x.png");
        assert_eq!(normalize_image("cid:embedded", &rules()), "cid:embedded");
        assert_eq!(normalize_image("", &rules()), "");
    }

    #[test]
    fn macro_href_wraps_foreign_domains_too() {
        assert_eq!(
            macro_href("https://example.com/page", &rules()),
            "%%=RedirectTo(concat('https://example.com/page?',@prefix))=%%"
        );
        // already-converted input is left alone
        let done = macro_href("https://www.sodimac.cl/x", &rules());
        assert_eq!(macro_href(&done, &rules()), done);
    }

    #[test]
    fn macro_href_placeholder_gets_no_separator() {
        assert_eq!(
            macro_href("#", &rules()),
            "%%=RedirectTo(concat('#',@prefix))=%%"
        );
    }
}
