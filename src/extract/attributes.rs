//! Attribute classification: which attributes carry URLs, scripts or styles

/// Semantic kind of an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
    /// Inline script (event handlers)
    Script,
    /// A single URI
    Uri,
    /// Whitespace- or comma-separated URIs (`srcset`, `archive`, `ping`)
    UriList,
    /// `<base href>`
    BaseUri,
    /// Inline CSS
    Style,
    /// `<meta content>`, interpreted through `http-equiv`
    MetaContent,
    /// `<param value>`, interpreted through `name`
    ParamContent,
    /// URI of an external script
    ScriptUri,
    /// URI of a navigable anchor
    AnchorUri,
}

impl AttrKind {
    /// Returns true for kinds whose value is resolved and added as a link
    pub fn is_link(&self) -> bool {
        matches!(self, Self::Uri | Self::ScriptUri | Self::AnchorUri | Self::BaseUri)
    }
}

/// Per-tag table, consulted before the tag-independent defaults
const TAG_ATTRIBUTES: &[(&str, &str, AttrKind)] = &[
    ("a", "href", AttrKind::AnchorUri),
    ("a", "ping", AttrKind::UriList),
    ("applet", "archive", AttrKind::UriList),
    ("applet", "code", AttrKind::Uri),
    ("applet", "codebase", AttrKind::Uri),
    ("area", "href", AttrKind::AnchorUri),
    ("area", "ping", AttrKind::UriList),
    ("audio", "src", AttrKind::Uri),
    ("base", "href", AttrKind::BaseUri),
    ("blockquote", "cite", AttrKind::Uri),
    ("body", "background", AttrKind::Uri),
    ("button", "formaction", AttrKind::Uri),
    ("del", "cite", AttrKind::Uri),
    ("embed", "src", AttrKind::Uri),
    ("form", "action", AttrKind::Uri),
    ("frame", "longdesc", AttrKind::Uri),
    ("frame", "src", AttrKind::Uri),
    ("head", "profile", AttrKind::UriList),
    ("html", "manifest", AttrKind::Uri),
    ("iframe", "longdesc", AttrKind::Uri),
    ("iframe", "src", AttrKind::Uri),
    ("img", "longdesc", AttrKind::Uri),
    ("img", "lowsrc", AttrKind::Uri),
    ("img", "src", AttrKind::Uri),
    ("img", "srcset", AttrKind::UriList),
    ("img", "usemap", AttrKind::Uri),
    ("input", "formaction", AttrKind::Uri),
    ("input", "src", AttrKind::Uri),
    ("input", "usemap", AttrKind::Uri),
    ("ins", "cite", AttrKind::Uri),
    ("link", "href", AttrKind::Uri),
    ("meta", "content", AttrKind::MetaContent),
    ("object", "archive", AttrKind::UriList),
    ("object", "classid", AttrKind::Uri),
    ("object", "codebase", AttrKind::Uri),
    ("object", "data", AttrKind::Uri),
    ("object", "usemap", AttrKind::Uri),
    ("param", "value", AttrKind::ParamContent),
    ("q", "cite", AttrKind::Uri),
    ("script", "src", AttrKind::ScriptUri),
    ("source", "src", AttrKind::Uri),
    ("source", "srcset", AttrKind::UriList),
    ("table", "background", AttrKind::Uri),
    ("td", "background", AttrKind::Uri),
    ("th", "background", AttrKind::Uri),
    ("track", "src", AttrKind::Uri),
    ("video", "poster", AttrKind::Uri),
    ("video", "src", AttrKind::Uri),
];

/// Tag-independent defaults
const DEFAULT_ATTRIBUTES: &[(&str, AttrKind)] = &[
    ("action", AttrKind::Uri),
    ("background", AttrKind::Uri),
    ("formaction", AttrKind::Uri),
    ("href", AttrKind::Uri),
    ("src", AttrKind::Uri),
    ("style", AttrKind::Style),
];

/// Classifies an attribute of an element
///
/// Tag and attribute names are matched case-insensitively. Any `on*`
/// attribute is an event handler script.
pub fn attribute_kind(tag: &str, attr: &str) -> Option<AttrKind> {
    let tag = tag.to_ascii_lowercase();
    let attr = attr.to_ascii_lowercase();

    if let Some((_, _, kind)) = TAG_ATTRIBUTES
        .iter()
        .find(|(t, a, _)| *t == tag && *a == attr)
    {
        return Some(*kind);
    }

    if attr.len() > 2 && attr.starts_with("on") {
        return Some(AttrKind::Script);
    }

    DEFAULT_ATTRIBUTES
        .iter()
        .find(|(a, _)| *a == attr)
        .map(|(_, kind)| *kind)
}

/// Strips a `javascript:` scheme, returning the script body
pub fn javascript_body(value: &str) -> Option<&str> {
    let trimmed = value.trim_start();
    match trimmed.get(..11) {
        Some(scheme) if scheme.eq_ignore_ascii_case("javascript:") => Some(&trimmed[11..]),
        _ => None,
    }
}

/// Splits a URI-list attribute into its URIs
///
/// `srcset` style lists are comma separated with an optional descriptor
/// after each URI; other lists are whitespace separated.
pub fn split_uri_list(attr: &str, value: &str) -> Vec<String> {
    if attr.eq_ignore_ascii_case("srcset") {
        value
            .split(',')
            .filter_map(|candidate| candidate.split_whitespace().next())
            .map(|s| s.to_string())
            .collect()
    } else {
        value.split_whitespace().map(|s| s.to_string()).collect()
    }
}
