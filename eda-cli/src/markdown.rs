//! Markdown rendering for terminal output

use colored::Colorize;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser, Tag};

/// Renders the narrative returned by the language model.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    use_colors: bool,
}

impl MarkdownRenderer {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Render markdown text to terminal output
    pub fn render(&self, markdown: &str) -> String {
        let mut output = String::new();
        let mut heading: Option<HeadingLevel> = None;
        let mut in_emphasis = false;
        let mut in_strong = false;
        let mut in_code_block = false;
        // One entry per open list: the next ordinal for ordered lists.
        let mut lists: Vec<Option<u64>> = Vec::new();

        for event in Parser::new(markdown) {
            match event {
                Event::Start(tag) => match tag {
                    Tag::Heading(level, _, _) => {
                        heading = Some(level);
                        ensure_blank_line(&mut output);
                    }
                    Tag::Paragraph => {
                        if lists.is_empty() {
                            ensure_blank_line(&mut output);
                        }
                    }
                    Tag::List(start) => {
                        if lists.is_empty() {
                            ensure_blank_line(&mut output);
                        } else if !output.ends_with('\n') {
                            output.push('\n');
                        }
                        lists.push(start);
                    }
                    Tag::Item => {
                        let indent = "  ".repeat(lists.len().saturating_sub(1));
                        output.push_str(&indent);
                        match lists.last_mut() {
                            Some(Some(n)) => {
                                output.push_str(&format!("{n}. "));
                                *n += 1;
                            }
                            _ => output.push_str("• "),
                        }
                    }
                    Tag::CodeBlock(kind) => {
                        in_code_block = true;
                        ensure_blank_line(&mut output);
                        if let CodeBlockKind::Fenced(lang) = kind {
                            if !lang.is_empty() {
                                output.push_str(&self.dim(&format!("[{lang}]")));
                                output.push('\n');
                            }
                        }
                    }
                    Tag::Emphasis => in_emphasis = true,
                    Tag::Strong => in_strong = true,
                    Tag::BlockQuote => output.push_str(&self.dim("│ ")),
                    _ => {}
                },
                Event::End(tag) => match tag {
                    Tag::Heading(..) => {
                        heading = None;
                        output.push('\n');
                    }
                    Tag::Paragraph => output.push('\n'),
                    Tag::List(_) => {
                        lists.pop();
                    }
                    Tag::Item => {
                        if !output.ends_with('\n') {
                            output.push('\n');
                        }
                    }
                    Tag::CodeBlock(_) => in_code_block = false,
                    Tag::Emphasis => in_emphasis = false,
                    Tag::Strong => in_strong = false,
                    _ => {}
                },
                Event::Text(text) => {
                    let styled = if in_code_block {
                        self.code_line(&text)
                    } else if let Some(level) = heading {
                        self.heading(&text, level)
                    } else if in_strong {
                        self.strong(&text)
                    } else if in_emphasis {
                        self.emphasis(&text)
                    } else {
                        text.to_string()
                    };
                    output.push_str(&styled);
                }
                Event::Code(code) => output.push_str(&self.inline_code(&code)),
                Event::SoftBreak => output.push(' '),
                Event::HardBreak => output.push('\n'),
                Event::Rule => {
                    ensure_blank_line(&mut output);
                    output.push_str(&self.dim(&"─".repeat(40)));
                    output.push('\n');
                }
                _ => {}
            }
        }

        output.trim().to_string()
    }

    fn heading(&self, text: &str, level: HeadingLevel) -> String {
        if !self.use_colors {
            return text.to_string();
        }
        match level {
            HeadingLevel::H1 | HeadingLevel::H2 => text.bright_cyan().bold().to_string(),
            _ => text.cyan().bold().to_string(),
        }
    }

    fn strong(&self, text: &str) -> String {
        if self.use_colors {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn emphasis(&self, text: &str) -> String {
        if self.use_colors {
            text.italic().to_string()
        } else {
            text.to_string()
        }
    }

    fn inline_code(&self, code: &str) -> String {
        if self.use_colors {
            code.yellow().to_string()
        } else {
            format!("`{code}`")
        }
    }

    fn code_line(&self, text: &str) -> String {
        if self.use_colors {
            text.green().to_string()
        } else {
            text.to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.use_colors {
            text.bright_black().to_string()
        } else {
            text.to_string()
        }
    }
}

fn ensure_blank_line(output: &mut String) {
    if output.is_empty() {
        return;
    }
    while !output.ends_with("\n\n") {
        output.push('\n');
    }
}
