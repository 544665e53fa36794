/// Destination for program output.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Stdout,
    /// Captures output in memory, for tests and embedding.
    Buffer(String),
    Silent,
}

impl Output {
    pub fn buffer() -> Self {
        Output::Buffer(String::new())
    }

    pub fn print(&mut self, text: &str) {
        match self {
            Output::Stdout => print!("{}", text),
            Output::Buffer(buffer) => buffer.push_str(text),
            Output::Silent => {}
        }
    }

    pub fn println(&mut self, text: &str) {
        self.print(text);
        self.print("\n");
    }

    /// Drains captured output. Always empty for stdout and silent sinks.
    pub fn take(&mut self) -> String {
        match self {
            Output::Buffer(buffer) => std::mem::take(buffer),
            Output::Stdout | Output::Silent => String::new(),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Output::Stdout
    }
}
