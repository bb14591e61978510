//! Themes: per-slot styles with CSS and ANSI output.

use std::fmt::Write as _;

use crate::highlights::ThemeSlot;

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `"#rrggbb"` or `"rrggbb"`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        if s.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(s.get(0..2)?, 16).ok()?;
        let g = u8::from_str_radix(s.get(2..4)?, 16).ok()?;
        let b = u8::from_str_radix(s.get(4..6)?, 16).ok()?;
        Some(Self { r, g, b })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Text attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        bold: false,
        italic: false,
        underline: false,
        strikethrough: false,
    };

    pub fn is_empty(self) -> bool {
        self == Self::NONE
    }
}

/// How one slot is painted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Style {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub modifiers: Modifiers,
}

impl Style {
    pub const fn new() -> Self {
        Self {
            fg: None,
            bg: None,
            modifiers: Modifiers::NONE,
        }
    }

    pub const fn fg(mut self, color: Color) -> Self {
        self.fg = Some(color);
        self
    }

    pub const fn bg(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }

    pub const fn bold(mut self) -> Self {
        self.modifiers.bold = true;
        self
    }

    pub const fn italic(mut self) -> Self {
        self.modifiers.italic = true;
        self
    }

    pub const fn underline(mut self) -> Self {
        self.modifiers.underline = true;
        self
    }

    pub const fn strikethrough(mut self) -> Self {
        self.modifiers.strikethrough = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fg.is_none() && self.bg.is_none() && self.modifiers.is_empty()
    }

    fn ansi_codes(&self) -> Vec<String> {
        let mut codes = Vec::new();
        if self.modifiers.bold {
            codes.push("1".to_string());
        }
        if self.modifiers.italic {
            codes.push("3".to_string());
        }
        if self.modifiers.underline {
            codes.push("4".to_string());
        }
        if self.modifiers.strikethrough {
            codes.push("9".to_string());
        }
        if let Some(Color { r, g, b }) = self.fg {
            codes.push(format!("38;2;{r};{g};{b}"));
        }
        if let Some(Color { r, g, b }) = self.bg {
            codes.push(format!("48;2;{r};{g};{b}"));
        }
        codes
    }

    fn css_declarations(&self) -> String {
        let mut css = String::new();
        if let Some(fg) = self.fg {
            let _ = write!(css, " color: {};", fg.to_hex());
        }
        if let Some(bg) = self.bg {
            let _ = write!(css, " background-color: {};", bg.to_hex());
        }
        if self.modifiers.bold {
            css.push_str(" font-weight: bold;");
        }
        if self.modifiers.italic {
            css.push_str(" font-style: italic;");
        }
        match (self.modifiers.underline, self.modifiers.strikethrough) {
            (true, true) => css.push_str(" text-decoration: underline line-through;"),
            (true, false) => css.push_str(" text-decoration: underline;"),
            (false, true) => css.push_str(" text-decoration: line-through;"),
            (false, false) => {}
        }
        css
    }
}

/// Errors produced while loading a theme file.
#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[cfg(feature = "toml")]
    #[error("theme is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid color {value:?} for {key}")]
    InvalidColor { key: String, value: String },

    #[error("invalid theme: {0}")]
    Invalid(String),
}

/// A named set of slot styles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub name: String,
    pub is_dark: bool,
    pub source_url: Option<String>,
    pub background: Option<Color>,
    pub foreground: Option<Color>,
    styles: [Style; ThemeSlot::COUNT],
}

impl Theme {
    /// Resets every attribute.
    pub const ANSI_RESET: &'static str = "\x1b[0m";

    /// A theme with no styles at all.
    pub fn new(name: impl Into<String>, is_dark: bool) -> Self {
        Self {
            name: name.into(),
            is_dark,
            source_url: None,
            background: None,
            foreground: None,
            styles: [Style::new(); ThemeSlot::COUNT],
        }
    }

    pub fn with_style(mut self, slot: ThemeSlot, style: Style) -> Self {
        self.set_style(slot, style);
        self
    }

    pub fn with_colors(mut self, background: Color, foreground: Color) -> Self {
        self.background = Some(background);
        self.foreground = Some(foreground);
        self
    }

    /// Replace the style of `slot`. Setting [`ThemeSlot::None`] is ignored.
    pub fn set_style(&mut self, slot: ThemeSlot, style: Style) {
        if let Some(index) = slot.index() {
            self.styles[index] = style;
        }
    }

    /// The style of `slot`; `None` only for [`ThemeSlot::None`].
    pub fn style(&self, slot: ThemeSlot) -> Option<&Style> {
        slot.index().map(|index| &self.styles[index])
    }

    /// The escape sequence that turns on `slot`'s style, empty if unstyled.
    pub fn ansi_style(&self, slot: ThemeSlot) -> String {
        match self.style(slot) {
            Some(style) if !style.is_empty() => {
                format!("\x1b[{}m", style.ansi_codes().join(";"))
            }
            _ => String::new(),
        }
    }

    /// The escape sequence for the theme's own background and foreground.
    pub fn ansi_base_style(&self) -> String {
        let mut style = Style::new();
        style.fg = self.foreground;
        style.bg = self.background;
        if style.is_empty() {
            String::new()
        } else {
            format!("\x1b[{}m", style.ansi_codes().join(";"))
        }
    }

    /// CSS rules for custom-element output, e.g. `a-k { color: #...; }`.
    ///
    /// `prefix` is the element prefix (`"a"` for the default format).
    pub fn to_css(&self, prefix: &str) -> String {
        let mut css = String::new();
        let base = Style {
            fg: self.foreground,
            bg: self.background,
            modifiers: Modifiers::NONE,
        };
        if !base.is_empty() {
            let _ = writeln!(css, "code.syntax {{{} }}", base.css_declarations());
        }
        for slot in ThemeSlot::ALL {
            let (Some(style), Some(tag)) = (self.style(slot), slot.tag()) else {
                continue;
            };
            if style.is_empty() {
                continue;
            }
            let _ = writeln!(css, "{prefix}-{tag} {{{} }}", style.css_declarations());
        }
        css
    }

    /// Parse a Helix-style theme file.
    ///
    /// Recognized keys: `name`, `variant` (`"light"` or `"dark"`), `source`,
    /// `background`/`foreground` (or `ui.background.bg`/`ui.foreground`),
    /// a `[palette]` of named colors, and one entry per slot or token type,
    /// either a color string or a table with `fg`, `bg` and `modifiers`.
    #[cfg(feature = "toml")]
    pub fn from_toml(source: &str) -> Result<Self, ThemeError> {
        use std::collections::HashMap;

        let value: toml::Value = source.parse()?;
        let table = value
            .as_table()
            .ok_or_else(|| ThemeError::Invalid("expected a table".into()))?;

        let name = table
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("custom");
        let is_dark = table
            .get("variant")
            .and_then(|v| v.as_str())
            .is_none_or(|v| v != "light");
        let mut theme = Theme::new(name, is_dark);
        theme.source_url = table
            .get("source")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let palette: HashMap<&str, Color> = table
            .get("palette")
            .and_then(|v| v.as_table())
            .map(|t| {
                t.iter()
                    .filter_map(|(k, v)| v.as_str().and_then(Color::from_hex).map(|c| (k.as_str(), c)))
                    .collect()
            })
            .unwrap_or_default();

        let resolve = |key: &str, value: &str| -> Result<Color, ThemeError> {
            Color::from_hex(value)
                .or_else(|| palette.get(value).copied())
                .ok_or_else(|| ThemeError::InvalidColor {
                    key: key.to_string(),
                    value: value.to_string(),
                })
        };

        let parse_style = |key: &str, value: &toml::Value| -> Result<Style, ThemeError> {
            let mut style = Style::new();
            match value {
                toml::Value::String(s) => style.fg = Some(resolve(key, s)?),
                toml::Value::Table(t) => {
                    if let Some(fg) = t.get("fg").and_then(|v| v.as_str()) {
                        style.fg = Some(resolve(key, fg)?);
                    }
                    if let Some(bg) = t.get("bg").and_then(|v| v.as_str()) {
                        style.bg = Some(resolve(key, bg)?);
                    }
                    let modifiers = t.get("modifiers").and_then(|v| v.as_array());
                    for m in modifiers.into_iter().flatten().filter_map(|m| m.as_str()) {
                        match m {
                            "bold" => style.modifiers.bold = true,
                            "italic" => style.modifiers.italic = true,
                            "underlined" | "underline" => style.modifiers.underline = true,
                            "crossed_out" | "strikethrough" => {
                                style.modifiers.strikethrough = true
                            }
                            _ => {}
                        }
                    }
                }
                _ => return Err(ThemeError::Invalid(format!("{key} must be a string or table"))),
            }
            Ok(style)
        };

        for (key, value) in table {
            match key.as_str() {
                "name" | "variant" | "source" | "palette" => {}
                "background" => {
                    if let Some(s) = value.as_str() {
                        theme.background = Some(resolve(key, s)?);
                    }
                }
                "foreground" => {
                    if let Some(s) = value.as_str() {
                        theme.foreground = Some(resolve(key, s)?);
                    }
                }
                "ui.background" => {
                    if let Some(s) = value.get("bg").and_then(|v| v.as_str()) {
                        theme.background.get_or_insert(resolve(key, s)?);
                    }
                }
                "ui.foreground" => {
                    let fg = value
                        .as_str()
                        .or_else(|| value.get("fg").and_then(|v| v.as_str()));
                    if let Some(s) = fg {
                        theme.foreground.get_or_insert(resolve(key, s)?);
                    }
                }
                _ => {
                    let slot = crate::slot_for_type(key);
                    if slot == ThemeSlot::None {
                        continue;
                    }
                    let style = parse_style(key, value)?;
                    // The slot's own name beats a token type sharing it.
                    if key == slot.name() || theme.style(slot).is_some_and(Style::is_empty) {
                        theme.set_style(slot, style);
                    }
                }
            }
        }

        Ok(theme)
    }
}

/// Themes compiled into the crate.
pub mod builtin {
    use super::{Color, Style, Theme};
    use crate::highlights::ThemeSlot;

    /// Every builtin theme name, in [`all`] order.
    pub const NAMES: [&str; 4] = ["base", "dark", "light", "monochrome"];

    /// Look up a builtin theme by name.
    pub fn by_name(name: &str) -> Option<Theme> {
        match name {
            "base" | "default" => Some(base()),
            "dark" => Some(dark()),
            "light" => Some(light()),
            "monochrome" | "mono" => Some(monochrome()),
            _ => None,
        }
    }

    /// Get all built-in themes.
    pub fn all() -> Vec<Theme> {
        vec![base(), dark(), light(), monochrome()]
    }

    /// The default theme: the 16-color-friendly palette of a classic terminal.
    pub fn base() -> Theme {
        let blue = Color::new(0x00, 0x5c, 0xc5);
        let green = Color::new(0x22, 0x86, 0x3a);
        let grey = Color::new(0x6a, 0x73, 0x7d);
        let purple = Color::new(0x6f, 0x42, 0xc1);
        let red = Color::new(0xd7, 0x3a, 0x49);
        let orange = Color::new(0xe3, 0x62, 0x09);

        Theme::new("base", false)
            .with_style(ThemeSlot::Keyword, Style::new().fg(blue).bold())
            .with_style(ThemeSlot::Function, Style::new().fg(purple))
            .with_style(ThemeSlot::String, Style::new().fg(green))
            .with_style(ThemeSlot::Comment, Style::new().fg(grey).italic())
            .with_style(ThemeSlot::Type, Style::new().fg(purple).bold())
            .with_style(ThemeSlot::Constant, Style::new().fg(orange))
            .with_style(ThemeSlot::Number, Style::new().fg(orange))
            .with_style(ThemeSlot::Operator, Style::new().fg(red))
            .with_style(ThemeSlot::Property, Style::new().fg(blue))
            .with_style(ThemeSlot::Attribute, Style::new().fg(purple))
            .with_style(ThemeSlot::Tag, Style::new().fg(blue))
            .with_style(ThemeSlot::Macro, Style::new().fg(grey).bold())
            .with_style(ThemeSlot::Label, Style::new().fg(purple))
            .with_style(ThemeSlot::Namespace, Style::new().fg(purple))
            .with_style(ThemeSlot::Title, Style::new().fg(blue).bold())
            .with_style(ThemeSlot::Strong, Style::new().bold())
            .with_style(ThemeSlot::Emphasis, Style::new().italic())
            .with_style(ThemeSlot::Link, Style::new().fg(blue).underline())
            .with_style(ThemeSlot::Literal, Style::new().fg(red))
            .with_style(ThemeSlot::Strikethrough, Style::new().strikethrough())
            .with_style(ThemeSlot::DiffAdd, Style::new().fg(green))
            .with_style(ThemeSlot::DiffDelete, Style::new().fg(red))
            .with_style(ThemeSlot::Embedded, Style::new().fg(grey))
            .with_style(ThemeSlot::Error, Style::new().fg(red).underline())
    }

    /// A dark theme in the spirit of One Dark.
    pub fn dark() -> Theme {
        let bg = Color::new(0x28, 0x2c, 0x34);
        let fg = Color::new(0xab, 0xb2, 0xbf);
        let purple = Color::new(0xc6, 0x78, 0xdd);
        let blue = Color::new(0x61, 0xaf, 0xef);
        let green = Color::new(0x98, 0xc3, 0x79);
        let grey = Color::new(0x5c, 0x63, 0x70);
        let yellow = Color::new(0xe5, 0xc0, 0x7b);
        let orange = Color::new(0xd1, 0x9a, 0x66);
        let cyan = Color::new(0x56, 0xb6, 0xc2);
        let red = Color::new(0xe0, 0x6c, 0x75);

        Theme::new("dark", true)
            .with_colors(bg, fg)
            .with_style(ThemeSlot::Keyword, Style::new().fg(purple))
            .with_style(ThemeSlot::Function, Style::new().fg(blue))
            .with_style(ThemeSlot::String, Style::new().fg(green))
            .with_style(ThemeSlot::Comment, Style::new().fg(grey).italic())
            .with_style(ThemeSlot::Type, Style::new().fg(yellow))
            .with_style(ThemeSlot::Variable, Style::new().fg(red))
            .with_style(ThemeSlot::Constant, Style::new().fg(orange))
            .with_style(ThemeSlot::Number, Style::new().fg(orange))
            .with_style(ThemeSlot::Operator, Style::new().fg(cyan))
            .with_style(ThemeSlot::Punctuation, Style::new().fg(fg))
            .with_style(ThemeSlot::Property, Style::new().fg(red))
            .with_style(ThemeSlot::Attribute, Style::new().fg(orange))
            .with_style(ThemeSlot::Tag, Style::new().fg(red))
            .with_style(ThemeSlot::Macro, Style::new().fg(cyan))
            .with_style(ThemeSlot::Label, Style::new().fg(cyan))
            .with_style(ThemeSlot::Namespace, Style::new().fg(yellow))
            .with_style(ThemeSlot::Constructor, Style::new().fg(yellow))
            .with_style(ThemeSlot::Title, Style::new().fg(red).bold())
            .with_style(ThemeSlot::Strong, Style::new().fg(orange).bold())
            .with_style(ThemeSlot::Emphasis, Style::new().fg(purple).italic())
            .with_style(ThemeSlot::Link, Style::new().fg(cyan).underline())
            .with_style(ThemeSlot::Literal, Style::new().fg(green))
            .with_style(ThemeSlot::Strikethrough, Style::new().strikethrough())
            .with_style(ThemeSlot::DiffAdd, Style::new().fg(green))
            .with_style(ThemeSlot::DiffDelete, Style::new().fg(red))
            .with_style(ThemeSlot::Embedded, Style::new().fg(fg))
            .with_style(ThemeSlot::Error, Style::new().fg(red).bold())
    }

    /// A light theme in the spirit of GitHub's.
    pub fn light() -> Theme {
        let bg = Color::new(0xff, 0xff, 0xff);
        let fg = Color::new(0x24, 0x29, 0x2e);
        let red = Color::new(0xd7, 0x3a, 0x49);
        let purple = Color::new(0x6f, 0x42, 0xc1);
        let navy = Color::new(0x03, 0x2f, 0x62);
        let blue = Color::new(0x00, 0x5c, 0xc5);
        let grey = Color::new(0x6a, 0x73, 0x7d);
        let green = Color::new(0x22, 0x86, 0x3a);
        let orange = Color::new(0xe3, 0x62, 0x09);

        Theme::new("light", false)
            .with_colors(bg, fg)
            .with_style(ThemeSlot::Keyword, Style::new().fg(red))
            .with_style(ThemeSlot::Function, Style::new().fg(purple))
            .with_style(ThemeSlot::String, Style::new().fg(navy))
            .with_style(ThemeSlot::Comment, Style::new().fg(grey))
            .with_style(ThemeSlot::Type, Style::new().fg(orange))
            .with_style(ThemeSlot::Variable, Style::new().fg(orange))
            .with_style(ThemeSlot::Constant, Style::new().fg(blue))
            .with_style(ThemeSlot::Number, Style::new().fg(blue))
            .with_style(ThemeSlot::Operator, Style::new().fg(red))
            .with_style(ThemeSlot::Property, Style::new().fg(blue))
            .with_style(ThemeSlot::Attribute, Style::new().fg(purple))
            .with_style(ThemeSlot::Tag, Style::new().fg(green))
            .with_style(ThemeSlot::Macro, Style::new().fg(red))
            .with_style(ThemeSlot::Label, Style::new().fg(purple))
            .with_style(ThemeSlot::Namespace, Style::new().fg(orange))
            .with_style(ThemeSlot::Constructor, Style::new().fg(purple))
            .with_style(ThemeSlot::Title, Style::new().fg(blue).bold())
            .with_style(ThemeSlot::Strong, Style::new().bold())
            .with_style(ThemeSlot::Emphasis, Style::new().italic())
            .with_style(ThemeSlot::Link, Style::new().fg(navy).underline())
            .with_style(ThemeSlot::Literal, Style::new().fg(blue))
            .with_style(ThemeSlot::Strikethrough, Style::new().strikethrough())
            .with_style(
                ThemeSlot::DiffAdd,
                Style::new().fg(green).bg(Color::new(0xf0, 0xff, 0xf4)),
            )
            .with_style(
                ThemeSlot::DiffDelete,
                Style::new().fg(red).bg(Color::new(0xff, 0xee, 0xf0)),
            )
            .with_style(ThemeSlot::Error, Style::new().fg(red).underline())
    }

    /// Attributes only, for terminals without color.
    pub fn monochrome() -> Theme {
        Theme::new("monochrome", true)
            .with_style(ThemeSlot::Keyword, Style::new().bold())
            .with_style(ThemeSlot::Comment, Style::new().italic())
            .with_style(ThemeSlot::Type, Style::new().bold())
            .with_style(ThemeSlot::Tag, Style::new().bold())
            .with_style(ThemeSlot::Title, Style::new().bold().underline())
            .with_style(ThemeSlot::Strong, Style::new().bold())
            .with_style(ThemeSlot::Emphasis, Style::new().italic())
            .with_style(ThemeSlot::Link, Style::new().underline())
            .with_style(ThemeSlot::Strikethrough, Style::new().strikethrough())
            .with_style(ThemeSlot::DiffAdd, Style::new().bold())
            .with_style(ThemeSlot::DiffDelete, Style::new().strikethrough())
            .with_style(ThemeSlot::Error, Style::new().underline())
    }
}
