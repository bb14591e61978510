//! XML, plus the `xml-tag` helper language that highlights the inside of a
//! single tag.

use canopy_highlight::{Capture, Expression, Language, Registry, Rule};

fn entity() -> Rule {
    Rule::new(r"&\w+;").typed("entity")
}

fn percent_escape() -> Rule {
    Rule::new(r"(?i)%[0-9a-f]{2}")
        .typed("percent-escape")
        .only(["string"])
}

fn tag_language() -> Language {
    let mut language = Language::new("xml-tag");

    // <tag>, <ns:tag>, </tag>, <tag attr="..."/>
    language.push(
        Rule::new(r"</?((?:[^:\s>]+:)?)([^\s>/]+)(\s[^>]*)?/?>").captures([
            Some(Capture::new(Expression::typed("namespace"))),
            Some(Capture::new(Expression::typed("tag-name"))),
        ]),
    );

    language.push(
        Rule::new(r#"([^=\s]+)=("[^"]*"|'[^']*'|[^\s>]+)"#).captures([
            Some(Capture::new(
                Expression::typed("attribute").only(["tag", "xml-tag"]),
            )),
            Some(Capture::new(
                Expression::typed("string")
                    .allow(["percent-escape", "entity"])
                    .only(["tag", "xml-tag"]),
            )),
        ]),
    );

    language
        .push(entity())
        .push(percent_escape())
        .push(Rule::single_quoted_string())
        .push(Rule::double_quoted_string());

    language
}

pub fn register(registry: &Registry) {
    registry.register(tag_language());

    let mut language = Language::new("xml");

    language.push(
        Rule::new(r"(?s)(<!(\[CDATA\[)(.*?)(\]\])>)").captures([
            Some(Capture::new(
                Expression::typed("cdata").allow(["cdata-content", "cdata-tag"]),
            )),
            Some(Capture::new(Expression::typed("cdata-tag"))),
            Some(Capture::new(Expression::typed("cdata-content"))),
            Some(Capture::new(Expression::typed("cdata-tag"))),
        ]),
    );

    language.push(Rule::xml_comment());

    // Every tag is handed to xml-tag as a whole.
    language.push(
        Rule::new(r#"<[^>\-\s!](?:[^>'"!/;?@\[\]^`{}|]|"[^"]*"|'[^']*')*[/?]?>"#)
            .typed("tag")
            .language("xml-tag"),
    );

    language
        .push(entity())
        .push(percent_escape())
        .push(Rule::web_link());

    registry.register(language);
}
