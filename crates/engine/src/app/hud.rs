/// Text lines drawn over the map for one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HudFrame {
    lines: Vec<String>,
}

impl HudFrame {
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
