use crate::ampscript::{macro_href, normalize_image};
use crate::config::LinkRules;
use crate::record::BannerRecord;
use regex::Regex;

/// How a single-banner fragment encodes its link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Plain anchor around the stored href.
    Plain,
    /// `var @link` AMPscript wrapper around the stored href.
    Macro,
}

impl LinkMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "plain" => Some(Self::Plain),
            "macro" => Some(Self::Macro),
            _ => None,
        }
    }
}

/// Render one banner as an email-client-safe table fragment.
pub fn render_banner(record: &BannerRecord, mode: LinkMode, rules: &LinkRules) -> String {
    let href = if record.href.is_empty() { "#" } else { &record.href };
    let image = image_tag(record, rules);

    match mode {
        LinkMode::Plain => format!(
            r#"<table width="600" cellpadding="0" cellspacing="0" border="0" style="margin: 0 auto;">
  <tr>
    <td>
      <a href="{href}" target="_blank" style="text-decoration: none;">
        {image}
      </a>
    </td>
  </tr>
</table>"#
        ),
        LinkMode::Macro => format!(
            r#"<table width="600" cellpadding="0" cellspacing="0" border="0" style="margin: 0 auto;">
  <tr>
    <td>
      %%[
      var @link = "{href}"
      ]%%
      <a href="%%=v(@link)=%%" target="_blank" style="text-decoration: none;">
        {image}
      </a>
    </td>
  </tr>
</table>"#
        ),
    }
}

/// Render a selection of banners as one stacked table, one row per record in
/// input order. Stack export only ever targets the macro-based delivery
/// platform, so every href goes through the redirect macro here.
pub fn render_stack(records: &[BannerRecord], rules: &LinkRules) -> String {
    let rows: Vec<String> = records.iter().map(|r| stack_row(r, rules)).collect();
    format!(
        "<table width=\"600\" cellspacing=\"0\" cellpadding=\"0\" align=\"center\">\n\n{}\n\n</table>",
        rows.join("\n")
    )
}

fn stack_row(record: &BannerRecord, rules: &LinkRules) -> String {
    let href = if record.href.is_empty() { "#" } else { &record.href };
    let href = macro_href(href, rules);
    let src = normalize_image(&record.image_src, rules);
    let alt = escape_attr(&record.alt);
    format!(
        r#"  <tr>
    <td colspan="2" align="center">
      <a href="{href}" target="_blank">
        <img src="{src}" alt="{alt}" style="display:block; width: 100%;" border="0">
      </a>
    </td>
  </tr>"#
    )
}

fn image_tag(record: &BannerRecord, rules: &LinkRules) -> String {
    format!(
        r#"<img src="{}" alt="{}" width="{}" height="{}" style="display: block; max-width: 100%;">"#,
        normalize_image(&record.image_src, rules),
        escape_attr(&record.alt),
        record.width,
        record.height,
    )
}

fn escape_attr(value: &str) -> String {
    value.replace('"', "&quot;")
}

/// Fields recognized in a pasted markup fragment. Any subset may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFragment {
    pub href: Option<String>,
    pub image_src: Option<String>,
    pub alt: Option<String>,
}

/// Scrape href/src/alt out of pasted HTML. Deliberately shallow: the first
/// anchor href and the first image's src/alt win, and anything unrecognized
/// yields `None` rather than a partial guess.
pub fn parse_fragment(html: &str) -> Option<ParsedFragment> {
    let href_re = Regex::new(r#"(?i)href\s*=\s*"([^"]+)""#).unwrap();
    let src_re = Regex::new(r#"(?i)<img[^>]*src\s*=\s*"([^"]+)""#).unwrap();
    let alt_re = Regex::new(r#"(?i)<img[^>]*alt\s*=\s*"([^"]*)""#).unwrap();

    let first = |re: &Regex| {
        re.captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    };

    let parsed = ParsedFragment {
        href: first(&href_re),
        image_src: first(&src_re),
        alt: first(&alt_re),
    };

    if parsed.href.is_none() && parsed.image_src.is_none() && parsed.alt.is_none() {
        None
    } else {
        Some(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkRules;

    fn banner(name: &str, href: &str, src: &str) -> BannerRecord {
        BannerRecord {
            id: 1,
            name: name.to_string(),
            href: href.to_string(),
            image_src: src.to_string(),
            alt: format!("Ir a {name}"),
            category: None,
            tags: Vec::new(),
            width: 600,
            height: 200,
            created_at: None,
        }
    }

    #[test]
    fn plain_fragment_keeps_stored_href_verbatim() {
        let record = banner("Promo", "https://example.com/promo", "https://cdn/p.png");
        let html = render_banner(&record, LinkMode::Plain, &LinkRules::default());
        assert!(html.contains(r#"<a href="https://example.com/promo" target="_blank""#));
        assert!(html.contains(r#"width="600" height="200""#));
        assert!(!html.contains("RedirectTo"));
    }

    #[test]
    fn macro_fragment_uses_link_variable() {
        let record = banner("Promo", "https://example.com/promo", "https://cdn/p.png");
        let html = render_banner(&record, LinkMode::Macro, &LinkRules::default());
        assert!(html.contains(r#"var @link = "https://example.com/promo""#));
        assert!(html.contains(r#"href="%%=v(@link)=%%""#));
    }

    #[test]
    fn stack_has_one_row_per_record_in_input_order() {
        let records = vec![
            banner("Primero", "https://www.sodimac.cl/a", "https://cdn/1.png"),
            banner("Segundo", "https://www.sodimac.cl/b", "https://cdn/2.png"),
        ];
        let html = render_stack(&records, &LinkRules::default());
        assert_eq!(html.matches("<tr>").count(), 2);
        let first = html.find("https://www.sodimac.cl/a").unwrap();
        let second = html.find("https://www.sodimac.cl/b").unwrap();
        assert!(first < second);
    }

    #[test]
    fn stack_hrefs_are_always_macro_encoded() {
        let records = vec![banner("Externo", "https://example.com/x", "https://cdn/e.png")];
        let html = render_stack(&records, &LinkRules::default());
        assert!(html.contains("%%=RedirectTo(concat('https://example.com/x?',@prefix))=%%"));
    }

    #[test]
    fn stack_row_with_empty_href_keeps_bare_placeholder() {
        let records = vec![banner("Huincha", "", "https://cdn/h.png")];
        let html = render_stack(&records, &LinkRules::default());
        assert!(html.contains("%%=RedirectTo(concat('#',@prefix))=%%"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let records = vec![
            banner("Uno", "https://www.sodimac.cl/a", "https://cdn/1.png"),
            banner("Dos", "", "/img/2.png"),
        ];
        let rules = LinkRules::default();
        assert_eq!(render_stack(&records, &rules), render_stack(&records, &rules));
        assert_eq!(
            render_banner(&records[0], LinkMode::Plain, &rules),
            render_banner(&records[0], LinkMode::Plain, &rules)
        );
    }

    #[test]
    fn parse_fragment_extracts_first_anchor_and_image() {
        let html = r#"<table><tr><td>
            <a href="https://www.sodimac.cl/promo" target="_blank">
              <img src="https://cdn/banner.png" alt="Gran promo" border="0">
            </a>
        </td></tr></table>"#;
        let parsed = parse_fragment(html).unwrap();
        assert_eq!(parsed.href.as_deref(), Some("https://www.sodimac.cl/promo"));
        assert_eq!(parsed.image_src.as_deref(), Some("https://cdn/banner.png"));
        assert_eq!(parsed.alt.as_deref(), Some("Gran promo"));
    }

    #[test]
    fn parse_fragment_rejects_unrecognized_markup() {
        assert_eq!(parse_fragment("<p>nothing to see</p>"), None);
        assert_eq!(parse_fragment(""), None);
    }
}
