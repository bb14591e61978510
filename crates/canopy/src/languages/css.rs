//! CSS, with color swatches and links to property documentation.

use canopy_highlight::{Capture, Expression, Language, Match, Registry, RenderNode, Rule, Term};

const COLOR_NAMES: &[&str] = &[
    "AliceBlue",
    "AntiqueWhite",
    "Aqua",
    "Aquamarine",
    "Azure",
    "Beige",
    "Bisque",
    "Black",
    "BlanchedAlmond",
    "Blue",
    "BlueViolet",
    "Brown",
    "BurlyWood",
    "CadetBlue",
    "Chartreuse",
    "Chocolate",
    "Coral",
    "CornflowerBlue",
    "Cornsilk",
    "Crimson",
    "Cyan",
    "DarkBlue",
    "DarkCyan",
    "DarkGoldenRod",
    "DarkGray",
    "DarkGreen",
    "DarkKhaki",
    "DarkMagenta",
    "DarkOliveGreen",
    "DarkOrange",
    "DarkOrchid",
    "DarkRed",
    "DarkSalmon",
    "DarkSeaGreen",
    "DarkSlateBlue",
    "DarkSlateGray",
    "DarkTurquoise",
    "DarkViolet",
    "DeepPink",
    "DeepSkyBlue",
    "DimGray",
    "DodgerBlue",
    "FireBrick",
    "FloralWhite",
    "ForestGreen",
    "Fuchsia",
    "Gainsboro",
    "GhostWhite",
    "Gold",
    "GoldenRod",
    "Gray",
    "Green",
    "GreenYellow",
    "HoneyDew",
    "HotPink",
    "IndianRed",
    "Indigo",
    "Ivory",
    "Khaki",
    "Lavender",
    "LavenderBlush",
    "LawnGreen",
    "LemonChiffon",
    "LightBlue",
    "LightCoral",
    "LightCyan",
    "LightGoldenRodYellow",
    "LightGrey",
    "LightGreen",
    "LightPink",
    "LightSalmon",
    "LightSeaGreen",
    "LightSkyBlue",
    "LightSlateGray",
    "LightSteelBlue",
    "LightYellow",
    "Lime",
    "LimeGreen",
    "Linen",
    "Magenta",
    "Maroon",
    "MediumAquaMarine",
    "MediumBlue",
    "MediumOrchid",
    "MediumPurple",
    "MediumSeaGreen",
    "MediumSlateBlue",
    "MediumSpringGreen",
    "MediumTurquoise",
    "MediumVioletRed",
    "MidnightBlue",
    "MintCream",
    "MistyRose",
    "Moccasin",
    "NavajoWhite",
    "Navy",
    "OldLace",
    "Olive",
    "OliveDrab",
    "Orange",
    "OrangeRed",
    "Orchid",
    "PaleGoldenRod",
    "PaleGreen",
    "PaleTurquoise",
    "PaleVioletRed",
    "PapayaWhip",
    "PeachPuff",
    "Peru",
    "Pink",
    "Plum",
    "PowderBlue",
    "Purple",
    "Red",
    "RosyBrown",
    "RoyalBlue",
    "SaddleBrown",
    "Salmon",
    "SandyBrown",
    "SeaGreen",
    "SeaShell",
    "Sienna",
    "Silver",
    "SkyBlue",
    "SlateBlue",
    "SlateGray",
    "Snow",
    "SpringGreen",
    "SteelBlue",
    "Tan",
    "Teal",
    "Thistle",
    "Tomato",
    "Turquoise",
    "Violet",
    "Wheat",
    "White",
    "WhiteSmoke",
    "Yellow",
    "YellowGreen",
];

const COLOR_PATTERNS: &[&str] = &[r"#[0-9a-f]{3,8}\b", r"rgba?\(.+?\)", r"hsla?\(.+?\)"];

/// Base URL of the property reference that property names link to.
pub const PROPERTY_DOCS: &str = "http://cssdocs.org/";

/// Append a swatch showing the color after the color's text.
fn color_swatch(mut node: RenderNode, m: &Match) -> RenderNode {
    if m.value().is_empty() {
        return node;
    }
    let mut sample = RenderNode::span("sample");
    sample.set_attribute("style", format!("background-color: {}", m.value()));
    let mut swatch = RenderNode::span("colour-box");
    swatch.push_node(sample);
    node.push_node(swatch);
    node
}

pub fn register(registry: &Registry) {
    let mut language = Language::new("css");

    language.push(Rule::new(r"\(.*?\)").allow_all().disallow(["property"]));

    language.push(
        Rule::new(r#"(?m)\s*([:.\[\]"'=\s\w#\-,]+)\s+\{"#)
            .captures([Some(Capture::new(
                Expression::typed("selector").allow(["string"]),
            ))]),
    );

    let colors = COLOR_NAMES
        .iter()
        .map(|name| Term::Literal(name.to_string()))
        .chain(COLOR_PATTERNS.iter().map(|pattern| Term::Regex(pattern.to_string())));
    language.push(
        Rule::alternatives(colors)
            .case_insensitive()
            .typed("color")
            .process(color_swatch),
    );

    language
        .push(Rule::c_style_comment())
        .push(Rule::web_link());

    language.push(Rule::new(r"(?s)\{.*?\}").typed("properties").allow_all());

    language.push(Rule::new(r":([^;{}]*)").captures([Some(Capture::new(
        Expression::typed("value")
            .allow(["color", "string", "function"])
            .only(["properties"]),
    ))]));

    let docs = Rule::web_link_process(PROPERTY_DOCS);
    language.push(Rule::new(r"([\-\w]+):").captures([Some(Capture::new(
        Expression::typed("property").process(move |node, m| docs(node, m)),
    ))]));

    language
        .push(Rule::single_quoted_string())
        .push(Rule::double_quoted_string())
        .push(Rule::string_escape())
        .push(Rule::c_style_function());

    registry.register(language);
}
