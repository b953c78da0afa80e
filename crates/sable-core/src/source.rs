#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMap {
    pub name: String,
    source: Vec<char>,
    line_indices: Vec<usize>,
}

impl SourceMap {
    pub fn new(name: &str, source: String) -> Self {
        let (chars, line_indices) = Self::load_source(source);

        Self {
            name: name.to_string(),
            source: chars,
            line_indices,
        }
    }

    pub fn from_source(source: String) -> Self {
        Self::new("<script>", source)
    }

    pub fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Ok(Self::new(&path.to_string_lossy(), source))
    }

    fn load_source(source: String) -> (Vec<char>, Vec<usize>) {
        let chars: Vec<char> = source.chars().collect();
        let line_indices = chars
            .iter()
            .enumerate()
            .filter_map(|(i, c)| (*c == '\n').then_some(i))
            .collect();

        (chars, line_indices)
    }

    pub fn get_source(&self) -> &[char] {
        &self.source
    }

    pub fn get_line(&self, line_number: u32) -> &[char] {
        if line_number == 0 {
            return &[];
        }

        let line_index = (line_number - 1) as usize;

        let start = if line_number == 1 {
            0
        } else if let Some(&prev_newline) = self.line_indices.get(line_index - 1) {
            prev_newline + 1
        } else {
            return &[];
        };

        let end = if let Some(&newline) = self.line_indices.get(line_index) {
            newline
        } else if line_index == self.line_indices.len() {
            self.source.len()
        } else {
            return &[];
        };

        if start <= end && end <= self.source.len() {
            &self.source[start..end]
        } else {
            &[]
        }
    }

    pub fn get_line_number(&self, position: usize) -> u32 {
        if position >= self.source.len() {
            return (self.line_indices.len() + 1) as u32;
        }

        match self.line_indices.binary_search(&position) {
            Ok(index) => (index + 1) as u32,
            Err(index) => (index + 1) as u32,
        }
    }

    pub fn get_column_number(&self, position: usize) -> u32 {
        if position >= self.source.len() {
            return 1;
        }
        let line_number = self.get_line_number(position);
        let line_start = if line_number == 1 {
            0
        } else {
            self.line_indices
                .get((line_number - 2) as usize)
                .map(|newline| newline + 1)
                .unwrap_or(0)
        };
        (position - line_start + 1) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_and_column_lookup() {
        let map = SourceMap::from_source("var a = 1;\nvar b = 2;\n".to_string());

        assert_eq!(map.get_line_number(0), 1);
        assert_eq!(map.get_line_number(11), 2);
        assert_eq!(map.get_column_number(11), 1);
        assert_eq!(map.get_column_number(15), 5);
    }

    #[test]
    fn get_line_returns_text_without_newline() {
        let map = SourceMap::from_source("first\nsecond".to_string());

        assert_eq!(map.get_line(1).iter().collect::<String>(), "first");
        assert_eq!(map.get_line(2).iter().collect::<String>(), "second");
        assert!(map.get_line(3).is_empty());
    }
}
