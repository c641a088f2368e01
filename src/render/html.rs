// Minimal HTML rendering of the block list
use html_escape::encode_text;

use crate::types::{Label, LabeledBlock};

const HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8" />
<link rel="stylesheet" href="https://unpkg.com/latex.css/style.min.css" />
</head>
<body>
"#;

const TAIL: &str = "</body>\n</html>\n";

/// Opening and closing tag for a label; unlisted labels become plain paragraphs.
pub fn tags_for(label: Label) -> (&'static str, &'static str) {
    match label {
        Label::Title => ("<h1 class='title'>", "</h1>"),
        Label::Text => ("<p class='text'>", "</p>"),
        Label::ListItem => ("<p class='list-item'>", "</p>"),
        Label::SectionHeader => ("<h2 class='section-header'>", "</h2>"),
        Label::Caption => ("<p class='caption'>", "</p>"),
        _ => ("<p>", "</p>"),
    }
}

pub fn render_html(blocks: &[LabeledBlock]) -> String {
    let mut output = String::from(HEAD);
    for block in blocks {
        let (open, close) = tags_for(block.label);
        output.push_str(open);
        output.push_str(&encode_text(&block.text));
        output.push_str(close);
        output.push('\n');
    }
    output.push_str(TAIL);
    output
}
