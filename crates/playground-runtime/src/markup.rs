//! Lenient markup parser.
//!
//! Accepts whatever an editor pane might hold mid-edit: unmatched close tags
//! are ignored, unclosed elements are closed at end of input, doctypes and
//! processing instructions are skipped. Text and attribute values are kept
//! as written.

use crate::document::{Element, KeyAlloc, Node, RAW_TEXT_ELEMENTS, VOID_ELEMENTS};

pub fn parse_html(html: &str, keys: &KeyAlloc) -> Vec<Node> {
    Parser {
        src: html,
        pos: 0,
        keys,
        root: Vec::new(),
        open: Vec::new(),
    }
    .parse()
}

struct Parser<'a, 'k> {
    src: &'a str,
    pos: usize,
    keys: &'k KeyAlloc,
    root: Vec<Node>,
    open: Vec<Element>,
}

impl<'a> Parser<'a, '_> {
    fn parse(mut self) -> Vec<Node> {
        while self.pos < self.src.len() {
            let rest = self.rest();
            if let Some(body) = rest.strip_prefix("<!--") {
                let (comment, used) = match body.find("-->") {
                    Some(end) => (&body[..end], 4 + end + 3),
                    None => (body, rest.len()),
                };
                self.push(Node::Comment(comment.to_string()));
                self.pos += used;
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.pos += rest.find('>').map_or(rest.len(), |i| i + 1);
            } else if rest.starts_with("</") && starts_with_letter(&rest[2..]) {
                self.close_tag();
            } else if rest.starts_with('<') && starts_with_letter(&rest[1..]) {
                self.open_tag();
            } else {
                let first = rest.chars().next().map_or(1, char::len_utf8);
                let len = rest[first..].find('<').map_or(rest.len(), |i| i + first);
                self.push(Node::Text(rest[..len].to_string()));
                self.pos += len;
            }
        }
        while !self.open.is_empty() {
            self.pop();
        }
        self.root
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn push(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root.push(node),
        }
    }

    fn pop(&mut self) {
        if let Some(el) = self.open.pop() {
            self.push(Node::Element(el));
        }
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !keep(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn skip_space(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn close_tag(&mut self) {
        self.pos += 2;
        let name = self.take_while(is_tag_char).to_ascii_lowercase();
        self.pos += self.rest().find('>').map_or(self.rest().len(), |i| i + 1);
        if let Some(depth) = self.open.iter().rposition(|el| el.tag == name) {
            while self.open.len() > depth {
                self.pop();
            }
        }
    }

    fn open_tag(&mut self) {
        self.pos += 1;
        let tag = self.take_while(is_tag_char).to_ascii_lowercase();
        let mut el = Element::new(self.keys.next(), tag);
        let mut self_closing = false;

        loop {
            self.skip_space();
            let rest = self.rest();
            if rest.is_empty() {
                break;
            }
            if let Some(after) = rest.strip_prefix("/>") {
                self.pos = self.src.len() - after.len();
                self_closing = true;
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            let name = self.take_while(|c| !c.is_whitespace() && !matches!(c, '=' | '>' | '/'));
            if name.is_empty() {
                // Stray `/` or `=`.
                self.pos += 1;
                continue;
            }
            let name = name.to_ascii_lowercase();
            self.skip_space();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_space();
                Some(self.attr_value())
            } else {
                None
            };
            el.attrs.push((name, value));
        }

        if self_closing || VOID_ELEMENTS.contains(&el.tag.as_str()) {
            self.push(Node::Element(el));
            return;
        }

        if RAW_TEXT_ELEMENTS.contains(&el.tag.as_str()) {
            let close = format!("</{}", el.tag);
            let rest = self.rest();
            let end = rest.to_ascii_lowercase().find(&close).unwrap_or(rest.len());
            if end > 0 {
                el.children.push(Node::Text(rest[..end].to_string()));
            }
            self.pos += end;
            let rest = self.rest();
            self.pos += rest.find('>').map_or(rest.len(), |i| i + 1);
            self.push(Node::Element(el));
            return;
        }

        self.open.push(el);
    }

    fn attr_value(&mut self) -> String {
        let rest = self.rest();
        match rest.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &rest[1..];
                let end = body.find(quote).unwrap_or(body.len());
                self.pos += 1 + end + usize::from(end < body.len());
                body[..end].to_string()
            }
            _ => {
                let end = rest
                    .char_indices()
                    .find(|&(i, c)| {
                        c.is_whitespace() || c == '>' || (c == '/' && rest[i + 1..].starts_with('>'))
                    })
                    .map_or(rest.len(), |(i, _)| i);
                self.pos += end;
                rest[..end].to_string()
            }
        }
    }
}

fn starts_with_letter(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_alphabetic())
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn roundtrip(html: &str) -> String {
        let keys = KeyAlloc::default();
        let mut doc = Document::new();
        doc.set_markup(html, &keys);
        doc.body_html()
    }

    #[test]
    fn nested_elements_and_attributes() {
        assert_eq!(
            roundtrip("<div id=\"root\" class='a b' hidden><p>Hi <b>there</b></p></div>"),
            "<div id=\"root\" class=\"a b\" hidden><p>Hi <b>there</b></p></div>"
        );
    }

    #[test]
    fn void_and_self_closing() {
        assert_eq!(
            roundtrip("<p>a<br>b<img src=x.png/><span/></p>"),
            "<p>a<br>b<img src=\"x.png\"><span></span></p>"
        );
    }

    #[test]
    fn unmatched_and_unclosed_tags() {
        assert_eq!(roundtrip("</b><div><p>x</div>y"), "<div><p>x</p></div>y");
        assert_eq!(roundtrip("<ul><li>one"), "<ul><li>one</li></ul>");
    }

    #[test]
    fn raw_text_and_comments() {
        assert_eq!(
            roundtrip("<!DOCTYPE html><!-- note --><script>if (a < b) {}</script>"),
            "<!-- note --><script>if (a < b) {}</script>"
        );
    }

    #[test]
    fn stray_angle_brackets_are_text() {
        assert_eq!(roundtrip("1 < 2 <3"), "1 < 2 <3");
    }

    #[test]
    fn uppercase_tags_are_normalized() {
        assert_eq!(roundtrip("<DIV ID=\"a\">x</Div>"), "<div id=\"a\">x</div>");
    }
}
