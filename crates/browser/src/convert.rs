//! Rendered-HTML to markdown conversion.
//!
//! A pure fold over the parsed node tree: the same fragment always yields
//! the same text, nothing is mutated, no state survives a call. The rules
//! mirror what the chat page itself renders (paragraphs, emphasis,
//! fenced code with a `language-*` class, nested lists, tables, quotes,
//! links and images); unrecognized containers pass their children
//! through untouched.

use ego_tree::NodeRef;
use scraper::{Html, Node};

/// Convert an HTML fragment to markdown. The result is trimmed of
/// leading and trailing whitespace.
pub fn html_to_markdown(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let rendered: String = fragment
        .tree
        .root()
        .children()
        .map(|child| render(child, 0))
        .collect();
    rendered.trim().to_string()
}

fn render(node: NodeRef<Node>, list_depth: usize) -> String {
    match node.value() {
        Node::Text(t) => String::from(&**t),
        Node::Element(el) => {
            let tag = el.name();
            match tag {
                "p" => format!("{}\n\n", render_children(node, list_depth)),
                "br" => "\n".to_string(),
                "strong" | "b" => format!("**{}**", render_children(node, list_depth)),
                "em" | "i" => format!("*{}*", render_children(node, list_depth)),
                "code" => {
                    let children = render_children(node, list_depth);
                    // Inside a fence the backticks come from the pre handler.
                    if parent_is(node, "pre") {
                        children
                    } else {
                        format!("`{}`", children)
                    }
                }
                "pre" => {
                    let code = node.descendants().find(|d| element_named(d, "code"));
                    let lang = code
                        .and_then(|c| element_attr(&c, "class"))
                        .and_then(|classes| {
                            classes
                                .split_whitespace()
                                .find_map(|c| c.strip_prefix("language-"))
                        })
                        .unwrap_or("");
                    let body = match code {
                        Some(c) => text_content(c),
                        None => render_children(node, list_depth),
                    };
                    format!("```{}\n{}\n```\n\n", lang, body)
                }
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    let level = tag[1..].parse::<usize>().unwrap_or(1);
                    format!(
                        "{} {}\n\n",
                        "#".repeat(level),
                        render_children(node, list_depth)
                    )
                }
                "ul" => {
                    let indent = "  ".repeat(list_depth);
                    let mut out = String::new();
                    for child in node.children() {
                        if element_named(&child, "li") {
                            out.push_str(&format!(
                                "{}- {}\n",
                                indent,
                                render(child, list_depth + 1).trim()
                            ));
                        }
                    }
                    if list_depth == 0 {
                        out.push('\n');
                    }
                    out
                }
                "ol" => {
                    let indent = "  ".repeat(list_depth);
                    let mut out = String::new();
                    let mut ordinal = 1;
                    for child in node.children() {
                        if element_named(&child, "li") {
                            out.push_str(&format!(
                                "{}{}. {}\n",
                                indent,
                                ordinal,
                                render(child, list_depth + 1).trim()
                            ));
                            ordinal += 1;
                        }
                    }
                    if list_depth == 0 {
                        out.push('\n');
                    }
                    out
                }
                "li" => render_children(node, list_depth),
                "a" => format!(
                    "[{}]({})",
                    render_children(node, list_depth),
                    el.attr("href").unwrap_or("")
                ),
                "blockquote" => {
                    let children = render_children(node, list_depth);
                    format!("> {}\n\n", children.replace('\n', "\n> "))
                }
                "hr" => "---\n\n".to_string(),
                "table" => format!("{}\n", render_children(node, list_depth)),
                "thead" | "tbody" => render_children(node, list_depth),
                "tr" => {
                    let cells: Vec<String> = node
                        .children()
                        .filter(|c| matches!(c.value(), Node::Element(_)))
                        .map(|c| render(c, list_depth).trim().to_string())
                        .collect();
                    format!("| {} |\n", cells.join(" | "))
                }
                "th" | "td" => render_children(node, list_depth),
                "img" => {
                    let alt = el.attr("alt").filter(|a| !a.is_empty()).unwrap_or("image");
                    let src = el.attr("src").unwrap_or("");
                    format!("![{}]({})", alt, src)
                }
                // span, div, and anything unrecognized are transparent.
                _ => render_children(node, list_depth),
            }
        }
        _ => String::new(),
    }
}

fn render_children(node: NodeRef<Node>, list_depth: usize) -> String {
    node.children().map(|c| render(c, list_depth)).collect()
}

fn parent_is(node: NodeRef<Node>, tag: &str) -> bool {
    node.parent().is_some_and(|p| element_named(&p, tag))
}

fn element_named(node: &NodeRef<Node>, tag: &str) -> bool {
    matches!(node.value(), Node::Element(el) if el.name() == tag)
}

fn element_attr<'a>(node: &NodeRef<'a, Node>, name: &str) -> Option<&'a str> {
    match node.value() {
        Node::Element(el) => el.attr(name),
        _ => None,
    }
}

/// Concatenated text of every text descendant, verbatim.
fn text_content(node: NodeRef<Node>) -> String {
    let mut out = String::new();
    for d in node.descendants() {
        if let Node::Text(t) = d.value() {
            out.push_str(t);
        }
    }
    out
}
