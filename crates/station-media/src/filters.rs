//! FFmpeg filter fragments.

/// Escape a path for use inside a quoted filter option.
pub fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "/").replace('\'', "\\'").replace(':', "\\:")
}

/// Escape literal text for `drawtext=text='...'`.
pub fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
        .replace('%', "\\%")
}

/// `drawtext` filter builder.
///
/// ```ignore
/// let filter = DrawText::new("FIN\\: 00")
///     .font_size(30)
///     .position("w-tw-20", "20")
///     .boxed("black@0.5", 5)
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawText {
    text: String,
    font_file: Option<String>,
    font_color: String,
    font_size: u32,
    x: String,
    y: String,
    box_style: Option<(String, u32)>,
}

impl DrawText {
    /// `text` must already be escaped (see [`escape_drawtext`]) or be an expression.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_file: None,
            font_color: "white".to_string(),
            font_size: 30,
            x: "(w-tw)/2".to_string(),
            y: "(h-th)/2".to_string(),
            box_style: None,
        }
    }

    pub fn font_file(mut self, path: Option<&str>) -> Self {
        self.font_file = path.map(escape_filter_path);
        self
    }

    pub fn font_color(mut self, color: impl Into<String>) -> Self {
        self.font_color = color.into();
        self
    }

    pub fn font_size(mut self, size: u32) -> Self {
        self.font_size = size;
        self
    }

    pub fn position(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x = x.into();
        self.y = y.into();
        self
    }

    pub fn boxed(mut self, color: impl Into<String>, border: u32) -> Self {
        self.box_style = Some((color.into(), border));
        self
    }

    pub fn build(&self) -> String {
        let mut filter = String::from("drawtext=");
        if let Some(font) = &self.font_file {
            filter.push_str(&format!("fontfile='{font}':"));
        }
        filter.push_str(&format!(
            "text='{}':fontcolor={}:fontsize={}:x={}:y={}",
            self.text, self.font_color, self.font_size, self.x, self.y
        ));
        if let Some((color, border)) = &self.box_style {
            filter.push_str(&format!(":box=1:boxcolor={color}:boxborderw={border}"));
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drawtext_with_box() {
        let filter = DrawText::new("hello")
            .position("w-tw-20", "20")
            .boxed("black@0.5", 5)
            .build();
        assert_eq!(
            filter,
            "drawtext=text='hello':fontcolor=white:fontsize=30:x=w-tw-20:y=20:box=1:boxcolor=black@0.5:boxborderw=5"
        );
    }

    #[test]
    fn test_font_path_escaped() {
        let filter = DrawText::new("x").font_file(Some("C:\\fonts\\a.ttf")).build();
        assert!(filter.starts_with("drawtext=fontfile='C\\:/fonts/a.ttf':"));
    }

    #[test]
    fn test_escape_drawtext() {
        assert_eq!(escape_drawtext("a:b'c"), "a\\:b\\'c");
    }
}
